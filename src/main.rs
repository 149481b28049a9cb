//! Watch a single bet until it resolves and print the result.
//!
//! Usage:
//!   bet-watcher <game> <contract> <bet-id> [--abi path.json] [--event Roll] [--currency ETH]
//!
//! The RPC endpoint and timings come from bet-watcher.toml (or
//! BET_WATCHER_RPC_URL when no file is present).

use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use bet_watcher::config::Config;
use bet_watcher::metrics::WatchMetrics;
use bet_watcher::onchain::abi::{self, ROLL_EVENT};
use bet_watcher::onchain::{AlloyChainClient, ChainClient};
use bet_watcher::{BetResultWatcher, GameType, WatchTarget};

const CONFIG_PATH: &str = "bet-watcher.toml";

struct Args {
    game: GameType,
    contract: Address,
    bet_id: U256,
    abi_path: Option<String>,
    event: String,
    currency: Option<String>,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut abi_path = None;
    let mut event = ROLL_EVENT.to_string();
    let mut currency = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--abi" => abi_path = Some(iter.next().context("--abi needs a path")?),
            "--event" => event = iter.next().context("--event needs a name")?,
            "--currency" => currency = Some(iter.next().context("--currency needs a symbol")?),
            _ if arg.starts_with("--") => bail!("unknown flag {arg}"),
            _ => positional.push(arg),
        }
    }

    let [game, contract, bet_id] = positional.as_slice() else {
        bail!("usage: bet-watcher <game> <contract> <bet-id> [--abi path] [--event name] [--currency symbol]");
    };

    Ok(Args {
        game: GameType::from_str(game).map_err(anyhow::Error::msg)?,
        contract: Address::from_str(contract).context("invalid contract address")?,
        bet_id: U256::from_str(bet_id).map_err(|e| anyhow::anyhow!("invalid bet id: {e}"))?,
        abi_path,
        event,
        currency,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = if Path::new(CONFIG_PATH).exists() {
        Config::load(Path::new(CONFIG_PATH))?
    } else {
        Config::from_env()
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("bet-watcher v{} starting", env!("CARGO_PKG_VERSION"));

    let args = parse_args()?;

    let event_abi = match &args.abi_path {
        Some(path) => abi::load_abi(Path::new(path))?,
        None => abi::roll_event_abi(args.game)?,
    };
    let mut target = WatchTarget::new(args.game, args.contract, args.bet_id, event_abi, &args.event);
    if let Some(currency) = &args.currency {
        target = target.with_currency(currency);
    }

    let client = Arc::new(AlloyChainClient::connect(&config.rpc.url).await?);
    let chain_id = client.chain_id().await?;
    let timings = config.watcher_for_chain(chain_id);
    info!(
        chain_id = chain_id,
        timeout_ms = timings.primary_timeout_ms,
        poll_interval_ms = timings.poll_interval_ms,
        lookback_blocks = timings.lookback_blocks,
        "watcher timings"
    );

    let metrics = Arc::new(Mutex::new(WatchMetrics::new()));
    let mut watcher = BetResultWatcher::new(timings).with_metrics(metrics.clone());
    let mut status = watcher.subscribe();
    watcher.watch(target, client);
    let outcome = watcher.outcome();

    // Surface fallback transitions to the operator while waiting
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            if snapshot.state.filter_error_occurred() && !snapshot.state.is_terminal() {
                warn!(status = %snapshot.status(), "still waiting, polling for the result");
            }
        }
    });

    let result = tokio::select! {
        result = outcome => result,
        _ = tokio::signal::ctrl_c() => {
            watcher.reset();
            bail!("interrupted");
        }
    };
    progress.abort();

    if let Ok(metrics) = metrics.lock() {
        metrics.log_summary();
    }

    let result = result?;
    println!("{result}");
    if let Some(tx) = result.transaction_hash {
        println!("tx: {tx}");
    }
    Ok(())
}
