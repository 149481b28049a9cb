use thiserror::Error;

use crate::game::{GameResult, GameType};

/// Fatal watcher errors, surfaced through `WatcherState::Error`.
///
/// Transient failures (subscription errors, timeouts, RPC errors while
/// polling) never end up here; they only move the watcher to the fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("event `{event}` not found in the supplied ABI")]
    MissingEvent { event: String },
    #[error("event `{event}` has no usable `{field}` input")]
    MissingEventField { event: String, field: String },
    #[error("no roll decoding rule for game type {0}")]
    UnsupportedGame(GameType),
    #[error("watch session was reset or replaced")]
    Cancelled,
}

/// Why the primary subscription was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Nothing arrived within the primary timeout.
    Timeout,
    SubscriptionError(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Timeout => write!(f, "timeout"),
            FallbackReason::SubscriptionError(e) => write!(f, "subscription error: {e}"),
        }
    }
}

/// Which channel delivered the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    Idle,
    Listening,
    FallbackListening,
    Success,
    Error,
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchStatus::Idle => write!(f, "idle"),
            WatchStatus::Listening => write!(f, "listening"),
            WatchStatus::FallbackListening => write!(f, "fallback_listening"),
            WatchStatus::Success => write!(f, "success"),
            WatchStatus::Error => write!(f, "error"),
        }
    }
}

/// Watcher state machine. Whether the primary channel failed is part of the
/// state itself, not a separate flag.
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherState {
    Idle,
    Listening,
    FallbackListening { reason: FallbackReason },
    Success { result: GameResult, channel: Channel },
    /// `channel` is the phase that raised the error.
    Error { error: WatchError, channel: Channel },
}

impl WatcherState {
    pub fn status(&self) -> WatchStatus {
        match self {
            WatcherState::Idle => WatchStatus::Idle,
            WatcherState::Listening => WatchStatus::Listening,
            WatcherState::FallbackListening { .. } => WatchStatus::FallbackListening,
            WatcherState::Success { .. } => WatchStatus::Success,
            WatcherState::Error { .. } => WatchStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WatcherState::Success { .. } | WatcherState::Error { .. })
    }

    /// True once the primary channel is no longer trusted for this session.
    pub fn filter_error_occurred(&self) -> bool {
        match self {
            WatcherState::FallbackListening { .. } => true,
            WatcherState::Success { channel, .. } | WatcherState::Error { channel, .. } => {
                *channel == Channel::Fallback
            }
            WatcherState::Idle | WatcherState::Listening => false,
        }
    }

    pub fn game_result(&self) -> Option<&GameResult> {
        match self {
            WatcherState::Success { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WatchError> {
        match self {
            WatcherState::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// State tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherSnapshot {
    /// Bumped on every arm and reset. Publications from older sessions are dropped.
    pub session: u64,
    pub state: WatcherState,
}

impl WatcherSnapshot {
    pub fn idle(session: u64) -> Self {
        Self {
            session,
            state: WatcherState::Idle,
        }
    }

    pub fn status(&self) -> WatchStatus {
        self.state.status()
    }
}
