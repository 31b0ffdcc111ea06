//! The websocket JSON-RPC client used to reach the node.

use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicU64, Ordering::Relaxed},
    Mutex,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tungstenite::{
    client::IntoClientRequest,
    http::{
        header::{HeaderValue, AUTHORIZATION},
        StatusCode,
    },
    stream::MaybeTlsStream,
    Connector, Message, WebSocket,
};

use super::error::RpcError;
use super::types::{extract_transaction, RawTransaction, Transaction};
use super::TxSource;

/// Settings of the node RPC connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcConfig {
    /// Hostname/IP and port of the node RPC server.
    pub server: String,
    /// RPC user name.
    pub user: String,
    /// RPC password.
    pub pass: String,
    /// File containing the node's TLS certificate.
    pub cert: Option<PathBuf>,
    /// Connect without TLS. Only sensible against localhost.
    pub disable_tls: bool,
}

/// A blocking JSON-RPC client over a websocket connection. Requests are
/// serialized over the single socket; responses are matched by id.
pub struct WsRpcClient {
    socket: Mutex<WebSocket<MaybeTlsStream<TcpStream>>>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcResponseError>,
    #[serde(default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponseError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl WsRpcClient {
    /// Connects and authenticates against the node's websocket endpoint.
    pub fn connect(config: &RpcConfig) -> Result<Self, RpcError> {
        let scheme = if config.disable_tls { "ws" } else { "wss" };
        let url = format!("{scheme}://{}/ws", config.server);

        let mut request = url
            .into_client_request()
            .map_err(|_| RpcError::General("invalid rpc server address"))?;

        let credentials = BASE64.encode(format!("{}:{}", config.user, config.pass));
        let header = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|_| RpcError::General("rpc credentials are not header safe"))?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let stream = TcpStream::connect(&config.server)?;

        let connector = if config.disable_tls {
            Connector::Plain
        } else {
            let mut builder = native_tls::TlsConnector::builder();
            if let Some(path) = &config.cert {
                let pem = std::fs::read(path)?;
                builder.add_root_certificate(native_tls::Certificate::from_pem(&pem)?);
            }
            Connector::NativeTls(builder.build()?)
        };

        let (socket, _response) =
            tungstenite::client_tls_with_config(request, stream, None, Some(connector)).map_err(
                |err| match err {
                    tungstenite::HandshakeError::Failure(err) => handshake_error(err),
                    tungstenite::HandshakeError::Interrupted(_) => {
                        RpcError::General("rpc handshake did not complete")
                    }
                },
            )?;

        log::debug!("Websocket RPC connection to {} established", config.server);

        Ok(Self {
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(0),
        })
    }

    /// The node's version string, fetched once at startup for logging.
    pub fn version(&self) -> Result<String, RpcError> {
        let result = self.call("version", Vec::new())?;

        if let Some(versions) = result.as_object() {
            let mut parts: Vec<String> = versions
                .iter()
                .map(|(name, info)| {
                    let version = info
                        .get("versionstring")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    format!("{name} {version}")
                })
                .collect();
            parts.sort();
            if !parts.is_empty() {
                return Ok(parts.join(", "));
            }
        }

        Ok(result.to_string())
    }

    fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Relaxed) + 1;
        let request = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut socket = self
            .socket
            .lock()
            .map_err(|_| RpcError::General("rpc client lock poisoned"))?;

        socket.send(Message::Text(request.to_string().into()))?;

        loop {
            match socket.read()? {
                Message::Text(payload) => {
                    let response: RpcResponse = serde_json::from_str(&payload)?;
                    // Notifications and stale replies carry other ids.
                    if response.id != Some(id) {
                        continue;
                    }
                    if let Some(error) = response.error {
                        return Err(RpcError::Rpc {
                            code: error.code,
                            message: error.message,
                        });
                    }
                    return Ok(response.result.unwrap_or(Value::Null));
                }
                Message::Ping(payload) => socket.send(Message::Pong(payload))?,
                Message::Close(_) => return Err(RpcError::General("rpc connection closed")),
                _ => continue,
            }
        }
    }
}

// A rejected handshake with a 401 means the configured credentials are
// wrong, which deserves better than a generic websocket error.
fn handshake_error(err: tungstenite::Error) -> RpcError {
    match err {
        tungstenite::Error::Http(ref response)
            if response.status() == StatusCode::UNAUTHORIZED =>
        {
            RpcError::Auth
        }
        other => RpcError::from(other),
    }
}

impl TxSource for WsRpcClient {
    fn transaction(&self, tx_hash: &str) -> Result<Transaction, RpcError> {
        let result = self.call("getrawtransaction", vec![json!(tx_hash), json!(1)])?;
        let raw: RawTransaction = serde_json::from_value(result)?;
        Ok(extract_transaction(raw))
    }
}
