//! Permissive decoding of resolution logs.
//!
//! Logs that don't match the event, fail ABI decoding or carry another bet id
//! are skipped; they are never errors. Only an unsupported game type, which is
//! a programming error on the caller's side, surfaces as `Err`. Retracted
//! logs (`removed: true`) are skipped as well.
//!
//! An event definition that lacks the fields a roll needs is rejected when
//! the decoder is built, since no log could ever decode against it.

use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::{B256, U256};
use alloy::rpc::types::{Filter, Log};
use tracing::debug;

use crate::game::GameResult;
use crate::onchain::abi::resolve_event;
use crate::watcher::{WatchError, WatchTarget};

/// Fields of a `Roll` event that the result mapper needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRoll {
    pub id: U256,
    pub payout: U256,
    pub rolled: Vec<DynSolValue>,
}

/// Decoder for one resolved event definition.
#[derive(Debug, Clone)]
pub struct RollDecoder {
    event: Event,
    selector: B256,
}

impl RollDecoder {
    /// Check `event` carries `id`, `payout` and `rolled` with usable types.
    pub fn new(event: Event) -> Result<Self, WatchError> {
        require_input(&event, "id", is_uint)?;
        require_input(&event, "payout", is_uint)?;
        require_input(&event, "rolled", is_array)?;
        let selector = event.selector();
        Ok(Self { event, selector })
    }

    /// Look up `name` in `abi` and build a decoder for it.
    pub fn resolve(abi: &JsonAbi, name: &str) -> Result<Self, WatchError> {
        Self::new(resolve_event(abi, name)?)
    }

    pub fn selector(&self) -> B256 {
        self.selector
    }

    /// Subscription filter: contract address, event topic and indexed args.
    ///
    /// Args naming a non-indexed input can't be expressed as topics and are
    /// left to `find_result`.
    pub fn filter(&self, target: &WatchTarget) -> Filter {
        let indexed: Vec<&str> = self
            .event
            .inputs
            .iter()
            .filter(|p| p.indexed)
            .map(|p| p.name.as_str())
            .collect();

        let mut filter = Filter::new()
            .address(target.contract_address)
            .event_signature(self.selector);

        for arg in &target.event_args {
            filter = match indexed.iter().position(|name| *name == arg.name) {
                Some(0) => filter.topic1(arg.value),
                Some(1) => filter.topic2(arg.value),
                Some(2) => filter.topic3(arg.value),
                _ => {
                    debug!(arg = %arg.name, event = %self.event.name, "arg is not an indexed input");
                    filter
                }
            };
        }
        filter
    }

    /// Same as `filter`, bounded to `[from_block, to_block]`.
    pub fn range_filter(&self, target: &WatchTarget, from_block: u64, to_block: u64) -> Filter {
        self.filter(target).from_block(from_block).to_block(to_block)
    }

    /// Try-decode a raw log. `None` for anything that isn't a well-formed roll.
    pub fn decode(&self, log: &Log) -> Option<DecodedRoll> {
        if log.topic0() != Some(&self.selector) {
            return None;
        }
        let decoded = self.event.decode_log(log.data()).ok()?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let (mut id, mut payout, mut rolled) = (None, None, None);

        for param in &self.event.inputs {
            let value = if param.indexed {
                indexed.next()?
            } else {
                body.next()?
            };
            match param.name.as_str() {
                "id" => id = value.as_uint().map(|(v, _)| v),
                "payout" => payout = value.as_uint().map(|(v, _)| v),
                "rolled" => {
                    rolled = match value {
                        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => Some(values),
                        _ => None,
                    }
                }
                _ => {}
            }
        }

        Some(DecodedRoll {
            id: id?,
            payout: payout?,
            rolled: rolled?,
        })
    }

    /// Map the first log resolving `target.bet_id` to a `GameResult`.
    ///
    /// Later matches in the same batch are ignored.
    pub fn find_result(
        &self,
        logs: &[Log],
        target: &WatchTarget,
    ) -> Result<Option<GameResult>, WatchError> {
        for log in logs {
            if log.removed {
                debug!(tx = ?log.transaction_hash, "skipping retracted log");
                continue;
            }
            let Some(roll) = self.decode(log) else {
                debug!(tx = ?log.transaction_hash, "skipping log that is not a roll");
                continue;
            };
            if roll.id != target.bet_id {
                continue;
            }
            match GameResult::from_roll(target.game_type, roll.payout, &roll.rolled, &target.currency)? {
                Some(mut result) => {
                    result.transaction_hash = log.transaction_hash;
                    result.block_number = log.block_number;
                    return Ok(Some(result));
                }
                None => {
                    debug!(bet_id = %roll.id, game = %target.game_type, "rolled values don't fit game type");
                }
            }
        }
        Ok(None)
    }
}

fn require_input(event: &Event, field: &str, fits: fn(&str) -> bool) -> Result<(), WatchError> {
    if event.inputs.iter().any(|p| p.name == field && fits(&p.ty)) {
        Ok(())
    } else {
        Err(WatchError::MissingEventField {
            event: event.name.clone(),
            field: field.to_string(),
        })
    }
}

fn is_uint(ty: &str) -> bool {
    ty.starts_with("uint") && !ty.ends_with(']')
}

fn is_array(ty: &str) -> bool {
    ty.ends_with(']')
}
