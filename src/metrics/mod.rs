//! Watcher metrics tracking.
//!
//! Tracks how bet resolutions are being delivered:
//! - Resolutions via the primary subscription vs the polling fallback
//! - Why the fallback was taken (timeout vs subscription error)
//! - Time from arming to resolution

use alloy::primitives::U256;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::info;

use crate::watcher::{Channel, FallbackReason};

/// Maximum history entries kept.
const MAX_HISTORY: usize = 1000;

/// A finished watch session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub bet_id: U256,
    /// Channel that delivered the result, `None` if the session failed.
    pub channel: Option<Channel>,
    pub fallback: Option<FallbackReason>,
    pub failed: bool,
    pub elapsed: Duration,
}

/// Aggregates over the recorded history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSummary {
    pub sessions: usize,
    pub resolved_primary: usize,
    pub resolved_fallback: usize,
    pub timeouts: usize,
    pub subscription_errors: usize,
    pub errors: usize,
    pub avg_resolution_ms: f64,
}

/// The metrics tracker.
#[derive(Debug, Default)]
pub struct WatchMetrics {
    sessions: VecDeque<SessionRecord>,
}

impl WatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished session.
    pub fn record(&mut self, record: SessionRecord) {
        if self.sessions.len() >= MAX_HISTORY {
            self.sessions.pop_front();
        }
        self.sessions.push_back(record);
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut summary = MetricsSummary {
            sessions: self.sessions.len(),
            ..Default::default()
        };

        let mut resolved_ms = Vec::new();
        for record in &self.sessions {
            match record.channel {
                Some(Channel::Primary) => summary.resolved_primary += 1,
                Some(Channel::Fallback) => summary.resolved_fallback += 1,
                None => {}
            }
            match record.fallback {
                Some(FallbackReason::Timeout) => summary.timeouts += 1,
                Some(FallbackReason::SubscriptionError(_)) => summary.subscription_errors += 1,
                None => {}
            }
            if record.failed {
                summary.errors += 1;
            } else {
                resolved_ms.push(record.elapsed.as_secs_f64() * 1000.0);
            }
        }

        if !resolved_ms.is_empty() {
            summary.avg_resolution_ms = resolved_ms.iter().sum::<f64>() / resolved_ms.len() as f64;
        }
        summary
    }

    /// Log a summary line.
    pub fn log_summary(&self) {
        let s = self.summary();
        info!(
            sessions = s.sessions,
            primary = s.resolved_primary,
            fallback = s.resolved_fallback,
            timeouts = s.timeouts,
            subscription_errors = s.subscription_errors,
            errors = s.errors,
            avg_resolution_ms = format!("{:.0}", s.avg_resolution_ms),
            "watcher metrics"
        );
    }
}
