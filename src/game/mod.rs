//! Game types and the mapping from a decoded `Roll` event to a `GameResult`.
//!
//! Each game encodes its outcome differently in the `rolled` array of the
//! resolution event:
//! - CoinToss: `bool[]`, true = heads
//! - Dice: `uint8[]`, the rolled number 1..=100
//! - Roulette: `uint8[]`, the rolled number 0..=36
//! - Keno: `uint40[]`, a bitmask of drawn balls (bit i = ball i + 1)
//!
//! Only the first element is used; multi-bet rolls repeat the same shape.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{B256, U256};
use std::str::FromStr;

use crate::watcher::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameType {
    CoinToss,
    Dice,
    Roulette,
    Keno,
    /// Weighted games. Known to the casino but with no roll decoding here.
    Wheel,
    Plinko,
}

impl GameType {
    pub const ALL: [GameType; 6] = [
        GameType::CoinToss,
        GameType::Dice,
        GameType::Roulette,
        GameType::Keno,
        GameType::Wheel,
        GameType::Plinko,
    ];

    /// Decode the first element of a `rolled` array.
    ///
    /// `Ok(None)` means the values don't have the shape this game expects,
    /// which callers treat like any other non-matching log.
    pub fn decode_rolled(&self, rolled: &[DynSolValue]) -> Result<Option<RolledOutcome>, WatchError> {
        let decode: fn(&DynSolValue) -> Option<RolledOutcome> = match self {
            GameType::CoinToss => |v| {
                v.as_bool().map(|heads| {
                    RolledOutcome::CoinToss(if heads { CoinFace::Heads } else { CoinFace::Tails })
                })
            },
            GameType::Dice => |v| small_uint(v).map(RolledOutcome::Dice),
            GameType::Roulette => |v| small_uint(v).map(RolledOutcome::Roulette),
            GameType::Keno => |v| {
                v.as_uint()
                    .and_then(|(mask, _)| u64::try_from(mask).ok())
                    .map(|mask| RolledOutcome::Keno(keno_balls(mask)))
            },
            GameType::Wheel | GameType::Plinko => {
                return Err(WatchError::UnsupportedGame(*self));
            }
        };
        Ok(rolled.first().and_then(decode))
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameType::CoinToss => write!(f, "coin-toss"),
            GameType::Dice => write!(f, "dice"),
            GameType::Roulette => write!(f, "roulette"),
            GameType::Keno => write!(f, "keno"),
            GameType::Wheel => write!(f, "wheel"),
            GameType::Plinko => write!(f, "plinko"),
        }
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "coin-toss" | "cointoss" | "coin" => Ok(GameType::CoinToss),
            "dice" => Ok(GameType::Dice),
            "roulette" => Ok(GameType::Roulette),
            "keno" => Ok(GameType::Keno),
            "wheel" => Ok(GameType::Wheel),
            "plinko" => Ok(GameType::Plinko),
            other => Err(format!("unknown game type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinFace {
    Heads,
    Tails,
}

impl std::fmt::Display for CoinFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoinFace::Heads => write!(f, "HEADS"),
            CoinFace::Tails => write!(f, "TAILS"),
        }
    }
}

/// Decoded outcome of a roll, shaped by game type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolledOutcome {
    CoinToss(CoinFace),
    Dice(u8),
    Roulette(u8),
    /// Drawn balls in ascending order.
    Keno(Vec<u8>),
}

impl std::fmt::Display for RolledOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RolledOutcome::CoinToss(face) => write!(f, "{face}"),
            RolledOutcome::Dice(n) | RolledOutcome::Roulette(n) => write!(f, "{n}"),
            RolledOutcome::Keno(balls) => {
                let balls: Vec<String> = balls.iter().map(|b| b.to_string()).collect();
                write!(f, "[{}]", balls.join(", "))
            }
        }
    }
}

/// Normalized result of a resolved bet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameResult {
    pub is_win: bool,
    /// Raw token units.
    pub payout: U256,
    pub currency: String,
    pub rolled: RolledOutcome,
    pub transaction_hash: Option<B256>,
    pub block_number: Option<u64>,
}

impl GameResult {
    /// Build a result from decoded roll fields. Transaction metadata is left empty.
    pub fn from_roll(
        game_type: GameType,
        payout: U256,
        rolled: &[DynSolValue],
        currency: &str,
    ) -> Result<Option<Self>, WatchError> {
        let Some(rolled) = game_type.decode_rolled(rolled)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            is_win: payout > U256::ZERO,
            payout,
            currency: currency.to_string(),
            rolled,
            transaction_hash: None,
            block_number: None,
        }))
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rolled={} payout={} {}",
            if self.is_win { "WIN" } else { "LOSS" },
            self.rolled,
            self.payout,
            self.currency
        )
    }
}

fn small_uint(value: &DynSolValue) -> Option<u8> {
    value.as_uint().and_then(|(n, _)| u8::try_from(n).ok())
}

fn keno_balls(mask: u64) -> Vec<u8> {
    (0u8..40).filter(|i| mask & (1u64 << i) != 0).map(|i| i + 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint8(n: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(n), 8)
    }

    #[test]
    fn test_coin_toss_faces() {
        let heads = GameType::CoinToss.decode_rolled(&[DynSolValue::Bool(true)]).unwrap();
        assert_eq!(heads, Some(RolledOutcome::CoinToss(CoinFace::Heads)));

        let tails = GameType::CoinToss.decode_rolled(&[DynSolValue::Bool(false)]).unwrap();
        assert_eq!(tails, Some(RolledOutcome::CoinToss(CoinFace::Tails)));
    }

    #[test]
    fn test_dice_and_roulette_numbers() {
        assert_eq!(
            GameType::Dice.decode_rolled(&[uint8(77)]).unwrap(),
            Some(RolledOutcome::Dice(77))
        );
        assert_eq!(
            GameType::Roulette.decode_rolled(&[uint8(0), uint8(12)]).unwrap(),
            Some(RolledOutcome::Roulette(0))
        );
    }

    #[test]
    fn test_keno_bitmask() {
        // balls 1, 3 and 40
        let mask = 1u64 | (1 << 2) | (1 << 39);
        let rolled = [DynSolValue::Uint(U256::from(mask), 40)];
        assert_eq!(
            GameType::Keno.decode_rolled(&rolled).unwrap(),
            Some(RolledOutcome::Keno(vec![1, 3, 40]))
        );
    }

    #[test]
    fn test_shape_mismatch_is_not_an_error() {
        assert_eq!(GameType::CoinToss.decode_rolled(&[uint8(1)]).unwrap(), None);
        assert_eq!(GameType::Dice.decode_rolled(&[DynSolValue::Bool(true)]).unwrap(), None);
        assert_eq!(GameType::Dice.decode_rolled(&[uint8(300)]).unwrap(), None);
        assert_eq!(GameType::Dice.decode_rolled(&[]).unwrap(), None);
    }

    #[test]
    fn test_unsupported_games() {
        for game in [GameType::Wheel, GameType::Plinko] {
            let err = game.decode_rolled(&[uint8(1)]).unwrap_err();
            assert_eq!(err, WatchError::UnsupportedGame(game));
        }
    }

    #[test]
    fn test_from_roll_win_and_loss() {
        let win = GameResult::from_roll(
            GameType::CoinToss,
            U256::from(1_940_000_000_000_000_000u128),
            &[DynSolValue::Bool(true)],
            "ETH",
        )
        .unwrap()
        .unwrap();
        assert!(win.is_win);
        assert_eq!(win.rolled, RolledOutcome::CoinToss(CoinFace::Heads));
        assert_eq!(win.to_string(), "WIN rolled=HEADS payout=1940000000000000000 ETH");

        let loss = GameResult::from_roll(GameType::Dice, U256::ZERO, &[uint8(3)], "USDC")
            .unwrap()
            .unwrap();
        assert!(!loss.is_win);
        assert_eq!(loss.currency, "USDC");
    }

    #[test]
    fn test_game_type_parsing() {
        assert_eq!("CoinToss".parse::<GameType>().unwrap(), GameType::CoinToss);
        assert_eq!("coin_toss".parse::<GameType>().unwrap(), GameType::CoinToss);
        assert_eq!("KENO".parse::<GameType>().unwrap(), GameType::Keno);
        assert!("baccarat".parse::<GameType>().is_err());
        for game in GameType::ALL {
            assert_eq!(game.to_string().parse::<GameType>().unwrap(), game);
        }
    }
}
