use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, B256, U256};

use crate::game::GameType;
use crate::onchain::abi::{self, AbiError, ROLL_EVENT};

/// An indexed event argument to filter on, already encoded as a topic word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedArg {
    pub name: String,
    pub value: B256,
}

impl IndexedArg {
    pub fn uint(name: &str, value: U256) -> Self {
        Self {
            name: name.to_string(),
            value: B256::from(value),
        }
    }

    pub fn address(name: &str, value: Address) -> Self {
        Self {
            name: name.to_string(),
            value: value.into_word(),
        }
    }
}

/// What to watch: one bet on one contract. Never mutated once a session
/// starts; a new bet means a new target.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchTarget {
    pub bet_id: U256,
    pub contract_address: Address,
    pub game_type: GameType,
    pub event_abi: JsonAbi,
    pub event_name: String,
    pub event_args: Vec<IndexedArg>,
    /// Display label copied into the result.
    pub currency: String,
}

impl WatchTarget {
    /// Target decoding with `event_name` from `event_abi`, filtered on `id = bet_id`.
    pub fn new(
        game_type: GameType,
        contract_address: Address,
        bet_id: U256,
        event_abi: JsonAbi,
        event_name: &str,
    ) -> Self {
        Self {
            bet_id,
            contract_address,
            game_type,
            event_abi,
            event_name: event_name.to_string(),
            event_args: vec![IndexedArg::uint("id", bet_id)],
            currency: "ETH".to_string(),
        }
    }

    /// Target using the game's built-in `Roll` event.
    pub fn builtin(game_type: GameType, contract_address: Address, bet_id: U256) -> Result<Self, AbiError> {
        let event_abi = abi::roll_event_abi(game_type)?;
        Ok(Self::new(game_type, contract_address, bet_id, event_abi, ROLL_EVENT))
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_event_args(mut self, args: Vec<IndexedArg>) -> Self {
        self.event_args = args;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_target_filters_on_bet_id() {
        let target = WatchTarget::builtin(GameType::Dice, Address::ZERO, U256::from(7u64)).unwrap();
        assert_eq!(target.event_name, "Roll");
        assert_eq!(target.currency, "ETH");
        assert_eq!(target.event_args, vec![IndexedArg::uint("id", U256::from(7u64))]);
        assert_eq!(target.event_args[0].value, B256::with_last_byte(7));
    }

    #[test]
    fn test_address_arg_is_left_padded() {
        let receiver = Address::repeat_byte(0xab);
        let arg = IndexedArg::address("receiver", receiver);
        assert_eq!(&arg.value[..12], &[0u8; 12]);
        assert_eq!(&arg.value[12..], receiver.as_slice());
    }

    #[test]
    fn test_builders() {
        let target = WatchTarget::builtin(GameType::Keno, Address::ZERO, U256::from(1u64))
            .unwrap()
            .with_currency("USDC")
            .with_event_args(vec![]);
        assert_eq!(target.currency, "USDC");
        assert!(target.event_args.is_empty());
    }
}
