//! Contract event ABI definitions.
//!
//! We define minimal ABIs covering just the `Roll` events we need to decode.
//! A target may also carry a full contract ABI loaded from JSON, in which case
//! the event is looked up by name at watch time.

use alloy::json_abi::{Event, JsonAbi};
use std::path::Path;
use thiserror::Error;

use crate::game::GameType;
use crate::watcher::WatchError;

/// Name of the resolution event emitted by every game contract.
pub const ROLL_EVENT: &str = "Roll";

// ─── Roll event signatures ───────────────────────────────────────────────────
//
// All games share the indexed prefix (id, receiver, token) and the trailing
// payout; only the bet input and the element type of `rolled` differ.

pub const COIN_TOSS_ROLL: &str = "event Roll(uint256 indexed id, address indexed receiver, address indexed token, uint256 totalBetAmount, bool face, bool[] rolled, uint256 payout)";

pub const DICE_ROLL: &str = "event Roll(uint256 indexed id, address indexed receiver, address indexed token, uint256 totalBetAmount, uint8 cap, uint8[] rolled, uint256 payout)";

pub const ROULETTE_ROLL: &str = "event Roll(uint256 indexed id, address indexed receiver, address indexed token, uint256 totalBetAmount, uint40 numbers, uint8[] rolled, uint256 payout)";

pub const KENO_ROLL: &str = "event Roll(uint256 indexed id, address indexed receiver, address indexed token, uint256 totalBetAmount, uint40 numbers, uint40[] rolled, uint256 payout)";

#[derive(Error, Debug)]
pub enum AbiError {
    #[error("failed to read ABI file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse ABI JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse event signature: {0}")]
    Signature(String),
    #[error("no built-in Roll event for {0}")]
    NoBuiltin(GameType),
}

/// Built-in `Roll` event signature for a game, if this crate ships one.
pub fn roll_signature(game: GameType) -> Option<&'static str> {
    match game {
        GameType::CoinToss => Some(COIN_TOSS_ROLL),
        GameType::Dice => Some(DICE_ROLL),
        GameType::Roulette => Some(ROULETTE_ROLL),
        GameType::Keno => Some(KENO_ROLL),
        GameType::Wheel | GameType::Plinko => None,
    }
}

/// A single-event ABI holding the game's `Roll` event.
pub fn roll_event_abi(game: GameType) -> Result<JsonAbi, AbiError> {
    let signature = roll_signature(game).ok_or(AbiError::NoBuiltin(game))?;
    let event = Event::parse(signature).map_err(|e| AbiError::Signature(e.to_string()))?;
    let mut abi = JsonAbi::default();
    abi.events.insert(event.name.clone(), vec![event]);
    Ok(abi)
}

/// Load a contract ABI from a JSON file (the `abi` array as emitted by solc).
pub fn load_abi(path: &Path) -> Result<JsonAbi, AbiError> {
    let contents = std::fs::read_to_string(path)?;
    parse_abi(&contents)
}

pub fn parse_abi(json: &str) -> Result<JsonAbi, AbiError> {
    Ok(serde_json::from_str(json)?)
}

/// Look up an event definition by name.
///
/// Overloads are resolved to the first definition. A missing event is a
/// configuration error and is never retried.
pub fn resolve_event(abi: &JsonAbi, name: &str) -> Result<Event, WatchError> {
    abi.events
        .get(name)
        .and_then(|overloads| overloads.first())
        .cloned()
        .ok_or_else(|| WatchError::MissingEvent {
            event: name.to_string(),
        })
}
