//! Node RPC plumbing.
//!
//! The engine only consumes the normalized [`types::Transaction`] shape
//! through the [`TxSource`] seam; everything about the wire lives in
//! [`client`].

pub mod client;
pub mod error;
pub mod types;

pub use client::{RpcConfig, WsRpcClient};

use error::RpcError;
use types::Transaction;

/// The engine's view of the node: resolves a transaction hash into its
/// normalized data.
pub trait TxSource: Send + Sync {
    /// Fetches the transaction with the given hash.
    fn transaction(&self, tx_hash: &str) -> Result<Transaction, RpcError>;
}
