//! Application level errors.

use crate::analyzer::error::AnalyzerError;
use crate::rpc::error::RpcError;

/// Enum to handle application related errors at the binary level.
#[derive(Debug)]
pub enum AppError {
    /// Funds-flow engine failure.
    Analyzer(AnalyzerError),
    /// Upstream node RPC failure.
    Rpc(RpcError),
    /// Standard IO errors during config or logger setup.
    IO(std::io::Error),
}

impl From<AnalyzerError> for AppError {
    fn from(value: AnalyzerError) -> Self {
        Self::Analyzer(value)
    }
}

impl From<RpcError> for AppError {
    fn from(value: RpcError) -> Self {
        Self::Rpc(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::IO(value)
    }
}
