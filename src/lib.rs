//! Bet result watcher for on-chain casino games.
//!
//! Watches a game contract for the resolution event of one bet and resolves
//! it to a win/loss `GameResult`, falling back from a log subscription to
//! polling when the subscription stalls or fails.

pub mod config;
pub mod game;
pub mod metrics;
pub mod onchain;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use game::{CoinFace, GameResult, GameType, RolledOutcome};
pub use watcher::{BetResultWatcher, WatchError, WatchInputs, WatchStatus, WatchTarget};
