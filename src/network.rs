//! Supported networks and their node RPC defaults.

use std::{fmt, str::FromStr};

/// The network a node is expected to be running on. Selects the default
/// RPC port the daemon connects to when no explicit server is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// The production network.
    #[default]
    Mainnet,
    /// The public test network.
    Testnet,
    /// The local simulation network.
    Simnet,
}

impl Network {
    /// Default node RPC port for this network.
    pub fn rpc_port(&self) -> u16 {
        match self {
            Network::Mainnet => 9109,
            Network::Testnet => 19109,
            Network::Simnet => 19556,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Simnet => write!(f, "simnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "simnet" => Ok(Network::Simnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
