//! Log builders and a scripted chain client for unit tests.

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::Event;
use alloy::primitives::{address, Address, LogData, B256, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::TransportErrorKind;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::onchain::abi::{KENO_ROLL, ROULETTE_ROLL};
use crate::onchain::{ChainClient, ClientError, LogStream};

pub const CONTRACT: Address = address!("00000000000000000000000000000000000c0170");

mod coin_toss {
    alloy::sol! {
        event Roll(uint256 indexed id, address indexed receiver, address indexed token, uint256 totalBetAmount, bool face, bool[] rolled, uint256 payout);
    }
}

mod dice {
    alloy::sol! {
        event Roll(uint256 indexed id, address indexed receiver, address indexed token, uint256 totalBetAmount, uint8 cap, uint8[] rolled, uint256 payout);
    }
}

fn rpc_log(data: LogData, block: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT,
            data,
        },
        block_number: Some(block),
        transaction_hash: Some(B256::with_last_byte((block % 256) as u8)),
        ..Default::default()
    }
}

/// A CoinToss `Roll` log as emitted by the contract.
pub fn coin_toss_log(bet_id: u64, payout: U256, heads: bool, block: u64) -> Log {
    let event = coin_toss::Roll {
        id: U256::from(bet_id),
        receiver: Address::repeat_byte(0x11),
        token: Address::ZERO,
        totalBetAmount: U256::from(1_000_000_000_000_000_000u128),
        face: true,
        rolled: vec![heads],
        payout,
    };
    rpc_log(event.encode_log_data(), block)
}

/// A Dice `Roll` log.
pub fn dice_log(bet_id: u64, payout: U256, rolled: u8, block: u64) -> Log {
    let event = dice::Roll {
        id: U256::from(bet_id),
        receiver: Address::repeat_byte(0x11),
        token: Address::ZERO,
        totalBetAmount: U256::from(1_000_000u64),
        cap: 50,
        rolled: vec![rolled],
        payout,
    };
    rpc_log(event.encode_log_data(), block)
}

/// Encode a `Roll` log against one of the built-in signatures.
fn encoded_roll(signature: &str, bet_id: u64, bet: DynSolValue, rolled: Vec<DynSolValue>, payout: U256, block: u64) -> Log {
    let event = Event::parse(signature).unwrap();
    let topics = vec![
        event.selector(),
        B256::from(U256::from(bet_id)),
        Address::repeat_byte(0x11).into_word(),
        Address::ZERO.into_word(),
    ];
    let body = DynSolValue::Tuple(vec![
        DynSolValue::Uint(U256::from(1_000_000u64), 256),
        bet,
        DynSolValue::Array(rolled),
        DynSolValue::Uint(payout, 256),
    ])
    .abi_encode_params();
    rpc_log(LogData::new_unchecked(topics, body.into()), block)
}

/// A Roulette `Roll` log landing on `number`.
pub fn roulette_log(bet_id: u64, payout: U256, number: u8, block: u64) -> Log {
    encoded_roll(
        ROULETTE_ROLL,
        bet_id,
        DynSolValue::Uint(U256::from(1u64 << number), 40),
        vec![DynSolValue::Uint(U256::from(number), 8)],
        payout,
        block,
    )
}

/// A Keno `Roll` log drawing the balls set in `drawn`.
pub fn keno_log(bet_id: u64, payout: U256, drawn: u64, block: u64) -> Log {
    encoded_roll(
        KENO_ROLL,
        bet_id,
        DynSolValue::Uint(U256::from(0b111u64), 40),
        vec![DynSolValue::Uint(U256::from(drawn), 40)],
        payout,
        block,
    )
}

type Batch = Result<Vec<Log>, ClientError>;

/// Scripted `ChainClient`.
///
/// Each `subscribe_logs` call takes the next queued subscription; with none
/// queued the stream stays silent forever. `get_logs` answers from the poll
/// script, then with empty results.
#[derive(Default)]
pub struct MockChainClient {
    block: u64,
    fail_subscriptions: Mutex<bool>,
    subscriptions: Mutex<VecDeque<mpsc::UnboundedReceiver<Batch>>>,
    polls: Mutex<VecDeque<Result<Vec<Log>, String>>>,
    queried: Mutex<Vec<(u64, u64)>>,
}

impl MockChainClient {
    pub fn new(block: u64) -> Arc<Self> {
        Arc::new(Self {
            block,
            ..Default::default()
        })
    }

    /// Queue a subscription and return its sending half.
    pub fn add_subscription(&self) -> mpsc::UnboundedSender<Batch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.lock().unwrap().push_back(rx);
        tx
    }

    /// Make every `subscribe_logs` call fail.
    pub fn fail_subscriptions(&self) {
        *self.fail_subscriptions.lock().unwrap() = true;
    }

    pub fn push_poll(&self, response: Result<Vec<Log>, String>) {
        self.polls.lock().unwrap().push_back(response);
    }

    /// Block ranges requested through `get_logs`, in order.
    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn subscribe_logs(&self, _filter: &Filter, _poll_interval: Duration) -> Result<LogStream, ClientError> {
        if *self.fail_subscriptions.lock().unwrap() {
            return Err(ClientError::Subscription("eth_subscribe not supported".into()));
        }
        match self.subscriptions.lock().unwrap().pop_front() {
            Some(rx) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|batch| (batch, rx))
            })
            .boxed()),
            None => Ok(futures::stream::pending().boxed()),
        }
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ClientError> {
        self.queried.lock().unwrap().push((
            filter.get_from_block().unwrap_or_default(),
            filter.get_to_block().unwrap_or_default(),
        ));
        match self.polls.lock().unwrap().pop_front() {
            Some(Ok(logs)) => Ok(logs),
            Some(Err(e)) => Err(TransportErrorKind::custom_str(&e).into()),
            None => Ok(Vec::new()),
        }
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.block)
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(31337)
    }
}
