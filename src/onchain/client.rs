//! Chain access used by the watcher.
//!
//! `ChainClient` is the seam between the watcher and the RPC node; the
//! watcher only ever borrows a client per call. `AlloyChainClient` is the
//! production implementation:
//! - WebSocket URLs subscribe via `eth_subscribe("logs")`
//! - HTTP URLs install a log filter and poll it at the configured interval

use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use alloy::transports::TransportError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("invalid rpc url: {0}")]
    InvalidUrl(String),
}

/// Push-delivered log batches. The stream ending means the subscription died.
pub type LogStream = BoxStream<'static, Result<Vec<Log>, ClientError>>;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Subscribe to logs matching `filter`. `poll_interval` applies to
    /// transports that emulate subscriptions by polling.
    async fn subscribe_logs(
        &self,
        filter: &Filter,
        poll_interval: Duration,
    ) -> Result<LogStream, ClientError>;

    /// Historical logs over the filter's explicit block range.
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ClientError>;

    async fn block_number(&self) -> Result<u64, ClientError>;

    async fn chain_id(&self) -> Result<u64, ClientError>;
}

/// `ChainClient` over an alloy provider.
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: DynProvider,
    pubsub: bool,
}

impl AlloyChainClient {
    /// Connect to `url`. `ws://`/`wss://` get a pubsub connection, anything
    /// else is treated as HTTP.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let pubsub = url.starts_with("ws://") || url.starts_with("wss://");
        let provider = if pubsub {
            ProviderBuilder::new()
                .connect_ws(WsConnect::new(url))
                .await?
                .erased()
        } else {
            let url = url
                .parse()
                .map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))?;
            ProviderBuilder::new().connect_http(url).erased()
        };
        info!(url = %url, pubsub = pubsub, "rpc client connected");
        Ok(Self { provider, pubsub })
    }

    pub fn from_provider(provider: DynProvider, pubsub: bool) -> Self {
        Self { provider, pubsub }
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn subscribe_logs(
        &self,
        filter: &Filter,
        poll_interval: Duration,
    ) -> Result<LogStream, ClientError> {
        if self.pubsub {
            let sub = self.provider.subscribe_logs(filter).await?;
            Ok(sub.into_stream().map(|log| Ok(vec![log])).boxed())
        } else {
            let poller = self.provider.watch_logs(filter).await?;
            Ok(poller
                .with_poll_interval(poll_interval)
                .into_stream()
                .map(Ok)
                .boxed())
        }
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ClientError> {
        Ok(self.provider.get_logs(filter).await?)
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(self.provider.get_chain_id().await?)
    }
}
