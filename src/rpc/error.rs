//! Node RPC client errors.

/// Represents errors raised while talking to the node.
#[derive(Debug)]
pub enum RpcError {
    /// Standard IO errors while connecting.
    IO(std::io::Error),
    /// WebSocket transport failure.
    WebSocket(Box<tungstenite::Error>),
    /// TLS setup failure.
    Tls(native_tls::Error),
    /// The node rejected the connection credentials.
    Auth,
    /// Malformed JSON in a response.
    Json(serde_json::Error),
    /// The node rejected the request.
    Rpc {
        /// Error code reported by the node.
        code: i64,
        /// Human readable message reported by the node.
        message: String,
    },
    /// Static string describing a general error condition.
    General(&'static str),
}

impl From<std::io::Error> for RpcError {
    fn from(value: std::io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<tungstenite::Error> for RpcError {
    fn from(value: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}

impl From<native_tls::Error> for RpcError {
    fn from(value: native_tls::Error) -> Self {
        Self::Tls(value)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
