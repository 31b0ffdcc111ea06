//! All funds-flow engine errors.

use crate::rpc::error::RpcError;

/// Represents errors that can occur while analyzing a transaction or
/// walking its ancestry.
#[derive(Debug)]
pub enum AnalyzerError {
    /// The transaction cannot be analyzed, e.g. it has no inputs or no
    /// outputs.
    InvalidTransaction(&'static str),
    /// An assembled solution failed a conservation check. Indicates a
    /// solver defect, never bad input.
    InternalInvariant(&'static str),
    /// The caller's cancellation token fired; partial state is discarded.
    Cancelled,
    /// Fetching ancestor data from the node failed.
    Rpc(RpcError),
}

impl From<RpcError> for AnalyzerError {
    fn from(value: RpcError) -> Self {
        Self::Rpc(value)
    }
}
