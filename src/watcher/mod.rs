//! Bet result watcher.
//!
//! Watches for the resolution event of a single bet and resolves it to a
//! `GameResult`. Two channels are used, never at the same time:
//! 1. Primary: a log subscription filtered on the bet id, bounded by a timeout
//! 2. Fallback: polling `eth_getLogs` over the last `lookback_blocks` blocks
//!
//! Architecture:
//! - Each armed target runs as ONE tokio task: primary phase, then fallback
//! - Cancelling (reset, disable, new target, drop) aborts that task, which
//!   drops its subscription, timeout and poll interval together
//! - State is published through a `tokio::sync::watch` channel; every write is
//!   checked against the session number so a stale task can't touch a newer
//!   session, and terminal states are never overwritten

pub mod state;
pub mod target;

pub use state::{Channel, FallbackReason, WatchError, WatchStatus, WatcherSnapshot, WatcherState};
pub use target::{IndexedArg, WatchTarget};

use futures::StreamExt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::WatcherConfig;
use crate::game::GameResult;
use crate::metrics::{SessionRecord, WatchMetrics};
use crate::onchain::{ChainClient, ClientError, RollDecoder};

/// Inputs driving the watcher, re-evaluated on every `update`.
pub struct WatchInputs<C: ?Sized> {
    pub target: Option<WatchTarget>,
    pub client: Option<Arc<C>>,
    pub enabled: bool,
}

/// Owner of the watch session for one bet at a time.
///
/// Arming spawns onto the current tokio runtime, so `update`/`watch` must be
/// called from within one.
pub struct BetResultWatcher<C: ChainClient + ?Sized + 'static> {
    config: WatcherConfig,
    state: Arc<watch::Sender<WatcherSnapshot>>,
    session: u64,
    task: Option<JoinHandle<()>>,
    armed: Option<WatchTarget>,
    metrics: Option<Arc<Mutex<WatchMetrics>>>,
    _client: std::marker::PhantomData<fn() -> Arc<C>>,
}

impl<C: ChainClient + ?Sized + 'static> BetResultWatcher<C> {
    pub fn new(config: WatcherConfig) -> Self {
        let (state, _) = watch::channel(WatcherSnapshot::idle(0));
        Self {
            config,
            state: Arc::new(state),
            session: 0,
            task: None,
            armed: None,
            metrics: None,
            _client: std::marker::PhantomData,
        }
    }

    /// Record every finished session into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Mutex<WatchMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply new inputs.
    ///
    /// - missing target or client, or `enabled == false`: reset to idle
    /// - same target as the running session: no-op (a finished session stays finished)
    /// - otherwise: cancel whatever runs and start listening for the new target
    pub fn update(&mut self, inputs: WatchInputs<C>) {
        let (Some(target), Some(client), true) = (inputs.target, inputs.client, inputs.enabled) else {
            if self.armed.is_some() || self.snapshot().status() != WatchStatus::Idle {
                self.reset();
            }
            return;
        };

        if self.armed.as_ref() == Some(&target) {
            return;
        }
        self.start(target, client);
    }

    /// Shorthand for an enabled `update`.
    pub fn watch(&mut self, target: WatchTarget, client: Arc<C>) {
        self.update(WatchInputs {
            target: Some(target),
            client: Some(client),
            enabled: true,
        });
    }

    /// Shorthand for `update` with `enabled == false`.
    pub fn disable(&mut self) {
        self.update(WatchInputs {
            target: None,
            client: None,
            enabled: false,
        });
    }

    /// Cancel any running session and return to idle with no result or error.
    pub fn reset(&mut self) {
        self.cancel_task();
        if let Some(target) = self.armed.take() {
            debug!(bet_id = %target.bet_id, session = self.session, "watch session reset");
        }
        self.session += 1;
        self.state.send_replace(WatcherSnapshot::idle(self.session));
    }

    pub fn snapshot(&self) -> WatcherSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> WatchStatus {
        self.state.borrow().status()
    }

    pub fn game_result(&self) -> Option<GameResult> {
        self.state.borrow().state.game_result().cloned()
    }

    pub fn error(&self) -> Option<WatchError> {
        self.state.borrow().state.error().cloned()
    }

    pub fn filter_error_occurred(&self) -> bool {
        self.state.borrow().state.filter_error_occurred()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<WatcherSnapshot> {
        self.state.subscribe()
    }

    /// Future resolving once the current session finishes.
    ///
    /// Yields `WatchError::Cancelled` if nothing is armed, or if the session is
    /// reset or replaced before it finishes.
    pub fn outcome(&self) -> impl Future<Output = Result<GameResult, WatchError>> + Send + 'static {
        let mut rx = self.state.subscribe();
        let session = self.session;
        async move {
            let snapshot = rx
                .wait_for(|s| {
                    s.session != session
                        || !matches!(s.status(), WatchStatus::Listening | WatchStatus::FallbackListening)
                })
                .await
                .map(|s| s.clone())
                .map_err(|_| WatchError::Cancelled)?;

            if snapshot.session != session {
                return Err(WatchError::Cancelled);
            }
            match snapshot.state {
                WatcherState::Success { result, .. } => Ok(result),
                WatcherState::Error { error, .. } => Err(error),
                _ => Err(WatchError::Cancelled),
            }
        }
    }

    fn start(&mut self, target: WatchTarget, client: Arc<C>) {
        self.cancel_task();
        self.session += 1;
        self.state.send_replace(WatcherSnapshot {
            session: self.session,
            state: WatcherState::Listening,
        });

        info!(
            bet_id = %target.bet_id,
            contract = %target.contract_address,
            game = %target.game_type,
            session = self.session,
            "listening for bet resolution"
        );

        let session = Session {
            id: self.session,
            state: self.state.clone(),
            config: self.config,
            target: target.clone(),
            client,
            metrics: self.metrics.clone(),
        };
        self.task = Some(tokio::spawn(session.run()));
        self.armed = Some(target);
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<C: ChainClient + ?Sized + 'static> Drop for BetResultWatcher<C> {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

enum PrimaryOutcome {
    Resolved(GameResult),
    Degraded(FallbackReason),
    Failed(WatchError),
}

enum PollError {
    Client(ClientError),
    Fatal(WatchError),
}

impl From<ClientError> for PollError {
    fn from(e: ClientError) -> Self {
        PollError::Client(e)
    }
}

impl From<WatchError> for PollError {
    fn from(e: WatchError) -> Self {
        PollError::Fatal(e)
    }
}

/// One armed target, owned by its task.
struct Session<C: ChainClient + ?Sized> {
    id: u64,
    state: Arc<watch::Sender<WatcherSnapshot>>,
    config: WatcherConfig,
    target: WatchTarget,
    client: Arc<C>,
    metrics: Option<Arc<Mutex<WatchMetrics>>>,
}

impl<C: ChainClient + ?Sized> Session<C> {
    async fn run(self) {
        let started = Instant::now();
        let mut fallback_reason = None;

        let outcome = match self.listen_primary().await {
            PrimaryOutcome::Resolved(result) => Ok((result, Channel::Primary)),
            PrimaryOutcome::Failed(error) => Err(error),
            PrimaryOutcome::Degraded(reason) => {
                warn!(
                    bet_id = %self.target.bet_id,
                    session = self.id,
                    reason = %reason,
                    "primary subscription abandoned, falling back to polling"
                );
                fallback_reason = Some(reason.clone());
                if !self.publish(WatcherState::FallbackListening { reason }) {
                    return;
                }
                self.poll_fallback().await.map(|result| (result, Channel::Fallback))
            }
        };

        let next = match &outcome {
            Ok((result, channel)) => {
                info!(
                    bet_id = %self.target.bet_id,
                    session = self.id,
                    channel = ?channel,
                    win = result.is_win,
                    payout = %result.payout,
                    rolled = %result.rolled,
                    "bet resolved"
                );
                WatcherState::Success {
                    result: result.clone(),
                    channel: *channel,
                }
            }
            Err(error) => {
                error!(bet_id = %self.target.bet_id, session = self.id, error = %error, "bet watch failed");
                WatcherState::Error {
                    error: error.clone(),
                    channel: if fallback_reason.is_some() { Channel::Fallback } else { Channel::Primary },
                }
            }
        };

        // Recorded before publishing so the record exists once callers see the outcome
        if let Some(metrics) = self.metrics.as_ref().filter(|_| self.is_current()) {
            if let Ok(mut metrics) = metrics.lock() {
                metrics.record(SessionRecord {
                    bet_id: self.target.bet_id,
                    channel: outcome.as_ref().ok().map(|(_, channel)| *channel),
                    fallback: fallback_reason,
                    failed: outcome.is_err(),
                    elapsed: started.elapsed(),
                });
            }
        }
        self.publish(next);
    }

    fn is_current(&self) -> bool {
        let snapshot = self.state.borrow();
        snapshot.session == self.id && !snapshot.state.is_terminal()
    }

    /// Write `next` unless this session is stale or already finished.
    fn publish(&self, next: WatcherState) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.session != self.id || snapshot.state.is_terminal() {
                return false;
            }
            snapshot.state = next;
            true
        })
    }

    async fn listen_primary(&self) -> PrimaryOutcome {
        let decoder = match RollDecoder::resolve(&self.target.event_abi, &self.target.event_name) {
            Ok(decoder) => decoder,
            Err(e) => return PrimaryOutcome::Degraded(FallbackReason::SubscriptionError(e.to_string())),
        };
        let filter = decoder.filter(&self.target);

        let deadline = tokio::time::sleep(self.config.primary_timeout());
        tokio::pin!(deadline);

        let subscribe = self.client.subscribe_logs(&filter, self.config.poll_interval());
        let mut stream = tokio::select! {
            _ = &mut deadline => return PrimaryOutcome::Degraded(FallbackReason::Timeout),
            subscribed = subscribe => match subscribed {
                Ok(stream) => stream,
                Err(e) => return PrimaryOutcome::Degraded(FallbackReason::SubscriptionError(e.to_string())),
            },
        };

        loop {
            tokio::select! {
                _ = &mut deadline => return PrimaryOutcome::Degraded(FallbackReason::Timeout),
                batch = stream.next() => match batch {
                    Some(Ok(logs)) => match decoder.find_result(&logs, &self.target) {
                        Ok(Some(result)) => return PrimaryOutcome::Resolved(result),
                        Ok(None) => debug!(session = self.id, logs = logs.len(), "no matching roll in batch"),
                        Err(e) => return PrimaryOutcome::Failed(e),
                    },
                    Some(Err(e)) => {
                        return PrimaryOutcome::Degraded(FallbackReason::SubscriptionError(e.to_string()))
                    }
                    None => {
                        return PrimaryOutcome::Degraded(FallbackReason::SubscriptionError(
                            "subscription stream ended".to_string(),
                        ))
                    }
                },
            }
        }
    }

    /// Poll until a matching log turns up. Only configuration and mapping
    /// errors end the loop; RPC failures are retried on the next tick.
    async fn poll_fallback(&self) -> Result<GameResult, WatchError> {
        let decoder = RollDecoder::resolve(&self.target.event_abi, &self.target.event_name)?;

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.poll_once(&decoder).await {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => {}
                Err(PollError::Client(e)) => {
                    warn!(bet_id = %self.target.bet_id, session = self.id, error = %e, "fallback poll failed");
                }
                Err(PollError::Fatal(e)) => return Err(e),
            }
        }
    }

    async fn poll_once(&self, decoder: &RollDecoder) -> Result<Option<GameResult>, PollError> {
        let to_block = self.client.block_number().await?;
        let from_block = to_block.saturating_sub(self.config.lookback_blocks);
        let filter = decoder.range_filter(&self.target, from_block, to_block);
        let logs = self.client.get_logs(&filter).await?;

        debug!(
            session = self.id,
            from_block = from_block,
            to_block = to_block,
            logs = logs.len(),
            "fallback poll"
        );
        Ok(decoder.find_result(&logs, &self.target)?)
    }
}
