//! On-chain plumbing for the bet result watcher.
//!
//! - `abi`: built-in `Roll` event definitions and event lookup by name
//! - `decoder`: filter construction and permissive log decoding
//! - `client`: the `ChainClient` seam and its alloy implementation

pub mod abi;
pub mod client;
pub mod decoder;

pub use client::{AlloyChainClient, ChainClient, ClientError, LogStream};
pub use decoder::{DecodedRoll, RollDecoder};
