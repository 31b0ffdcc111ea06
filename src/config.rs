//! Application configuration. Controlling server, node RPC and engine behavior.
//!
//! Configuration resolves in three layers: built-in defaults, the config
//! file, and command line flags. Command line flags always take precedence.

use std::{
    io,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    network::Network,
    rpc::RpcConfig,
    utill::{get_data_dir, parse_field, parse_toml},
};

/// Default host the analysis HTTP server binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port the analysis HTTP server binds to.
pub const DEFAULT_PORT: u16 = 8476;

/// Application configuration.
///
/// Controls the HTTP listener, the node RPC client credentials, and the
/// engine tunables (complex-transaction cutoff and provenance walk depth).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Logging level {off, error, warn, info, debug, trace}.
    pub debug_level: String,
    /// Application data directory.
    pub app_data_dir: PathBuf,
    /// Directory to log output.
    pub log_dir: PathBuf,
    /// The network the node runs on.
    pub network: Network,
    /// Host the analysis server listens on.
    pub host: String,
    /// Port the analysis server listens on.
    pub port: u16,
    /// Node RPC user name.
    pub rpc_user: String,
    /// Node RPC password.
    pub rpc_pass: String,
    /// Hostname/IP and port of the node RPC server. Empty selects
    /// `127.0.0.1:<network default port>`.
    pub rpc_server: String,
    /// File containing the node RPC TLS certificate.
    pub rpc_cert: Option<PathBuf>,
    /// Disable TLS for the node RPC client. Only sensible against localhost.
    pub disable_tls: bool,
    /// Maximum reduced inputs + outputs the engine analyzes before bailing
    /// out with a low-traceability status.
    pub endpoint_cutoff: usize,
    /// Ancestor depth budget of the provenance walk.
    pub chain_depth: usize,
    /// Per-request analysis deadline in seconds. Zero disables the deadline.
    pub timeout_secs: u64,
    /// Enable CPU profiling endpoints.
    pub profile: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug_level: "info".to_string(),
            app_data_dir: get_data_dir(),
            log_dir: get_data_dir().join("logs"),
            network: Network::Mainnet,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rpc_user: String::new(),
            rpc_pass: String::new(),
            rpc_server: String::new(),
            rpc_cert: None,
            disable_tls: false,
            endpoint_cutoff: 20,
            chain_depth: 10,
            timeout_secs: 0,
            profile: false,
        }
    }
}

impl AppConfig {
    /// Constructs an [`AppConfig`] from the config file at `config_path`,
    /// or creates a default config file there when none exists.
    ///
    /// Default config location: `~/.chainflow/config.conf`.
    pub fn new(config_path: Option<&Path>) -> io::Result<Self> {
        let default_config_path = get_data_dir().join("config.conf");
        let config_path = config_path.unwrap_or(&default_config_path);
        let default_config = Self::default();

        if !config_path.exists() || std::fs::metadata(config_path)?.len() == 0 {
            log::warn!(
                "Config file not found, creating default config file at path: {}",
                config_path.display()
            );
            default_config.write_to_file(config_path)?;
        }

        let config_map = parse_toml(config_path)?;

        let rpc_cert = config_map
            .get("rpccert")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(AppConfig {
            debug_level: parse_field(
                config_map.get("debuglevel"),
                default_config.debug_level,
            ),
            app_data_dir: parse_field(
                config_map.get("appdata"),
                default_config.app_data_dir,
            ),
            log_dir: parse_field(config_map.get("logdir"), default_config.log_dir),
            network: parse_field(config_map.get("network"), default_config.network),
            host: parse_field(config_map.get("host"), default_config.host),
            port: parse_field(config_map.get("port"), default_config.port),
            rpc_user: parse_field(config_map.get("rpcuser"), default_config.rpc_user),
            rpc_pass: parse_field(config_map.get("rpcpass"), default_config.rpc_pass),
            rpc_server: parse_field(config_map.get("rpcserv"), default_config.rpc_server),
            rpc_cert,
            disable_tls: parse_field(config_map.get("notls"), default_config.disable_tls),
            endpoint_cutoff: parse_field(
                config_map.get("endpointcutoff"),
                default_config.endpoint_cutoff,
            ),
            chain_depth: parse_field(
                config_map.get("chaindepth"),
                default_config.chain_depth,
            ),
            timeout_secs: parse_field(
                config_map.get("timeoutsecs"),
                default_config.timeout_secs,
            ),
            profile: default_config.profile,
        })
    }

    /// The node RPC server address, falling back to localhost with the
    /// active network's default port.
    pub fn rpc_address(&self) -> String {
        if self.rpc_server.is_empty() {
            format!("127.0.0.1:{}", self.network.rpc_port())
        } else {
            self.rpc_server.clone()
        }
    }

    /// Projects the node RPC client settings out of the full config.
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            server: self.rpc_address(),
            user: self.rpc_user.clone(),
            pass: self.rpc_pass.clone(),
            cert: self.rpc_cert.clone(),
            disable_tls: self.disable_tls,
        }
    }

    // Manually serialize the config into the INI-style file format.
    fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let data = format!(
            "[application]
debuglevel = {}
host = {}
port = {}
network = {}

[rpc]
rpcuser = {}
rpcpass = {}
rpcserv = {}
notls = {}

[engine]
endpointcutoff = {}
chaindepth = {}
timeoutsecs = {}
",
            self.debug_level,
            self.host,
            self.port,
            self.network,
            self.rpc_user,
            self.rpc_pass,
            self.rpc_server,
            self.disable_tls,
            self.endpoint_cutoff,
            self.chain_depth,
            self.timeout_secs,
        );
        std::fs::create_dir_all(path.parent().expect("Path should NOT be root!"))?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(data.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
