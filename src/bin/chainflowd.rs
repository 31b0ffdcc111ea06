use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use chainflow::{
    config::AppConfig,
    error::AppError,
    explorer::{self, AppState},
    network::Network,
    rpc::{TxSource, WsRpcClient},
    utill,
};

/// The transaction funds-flow analysis daemon.
///
/// Connects to a running node over websocket RPC and serves funds-flow
/// partitions, per-output linking probabilities and provenance paths over
/// a JSON HTTP API.
#[derive(Parser, Debug)]
#[clap(version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
author = option_env!("CARGO_PKG_AUTHORS").unwrap_or(""))]
struct Cli {
    /// Logging level {off, error, warn, info, debug, trace}
    #[clap(short = 'd', long)]
    debuglevel: Option<String>,

    /// Path to configuration file
    #[clap(short = 'C', long)]
    configfile: Option<PathBuf>,

    /// Application data directory
    #[clap(short = 'A', long)]
    appdata: Option<PathBuf>,

    /// Directory to log output
    #[clap(long)]
    logdir: Option<PathBuf>,

    /// Use the test network (default mainnet)
    #[clap(long)]
    testnet: bool,

    /// Use the simulation test network (default mainnet)
    #[clap(long)]
    simnet: bool,

    /// Analysis server host
    #[clap(long)]
    host: Option<String>,

    /// Analysis server port
    #[clap(long)]
    port: Option<u16>,

    /// Node RPC user name
    #[clap(long)]
    rpcuser: Option<String>,

    /// Node RPC password
    #[clap(long)]
    rpcpass: Option<String>,

    /// Hostname/IP and port of the node RPC server to connect to
    /// (default localhost:9109, testnet: localhost:19109, simnet:
    /// localhost:19556)
    #[clap(long)]
    rpcserv: Option<String>,

    /// File containing the node RPC certificate file
    #[clap(long)]
    rpccert: Option<PathBuf>,

    /// Disable TLS for the node RPC client -- NOTE: This is only allowed
    /// if the RPC client is connecting to localhost
    #[clap(long)]
    notls: bool,

    /// Enable CPU profiling
    #[clap(long)]
    profile: bool,
}

impl Cli {
    // Command line flags take precedence over the config file.
    fn apply(self, config: &mut AppConfig) {
        if let Some(debuglevel) = self.debuglevel {
            config.debug_level = debuglevel;
        }
        if let Some(appdata) = self.appdata {
            config.log_dir = appdata.join("logs");
            config.app_data_dir = appdata;
        }
        if let Some(logdir) = self.logdir {
            config.log_dir = logdir;
        }
        if self.testnet {
            config.network = Network::Testnet;
        }
        if self.simnet {
            config.network = Network::Simnet;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(rpcuser) = self.rpcuser {
            config.rpc_user = rpcuser;
        }
        if let Some(rpcpass) = self.rpcpass {
            config.rpc_pass = rpcpass;
        }
        if let Some(rpcserv) = self.rpcserv {
            config.rpc_server = rpcserv;
        }
        if let Some(rpccert) = self.rpccert {
            config.rpc_cert = Some(rpccert);
        }
        if self.notls {
            config.disable_tls = true;
        }
        if self.profile {
            config.profile = true;
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.testnet && cli.simnet {
        eprintln!("Testnet and Simnet should not be set simultaneously.");
        std::process::exit(1);
    }

    if let Err(err) = run(cli) {
        log::error!("{err:?}");
        eprintln!("chainflowd failed: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::new(cli.configfile.as_deref())?;
    cli.apply(&mut config);

    utill::setup_logger(utill::parse_log_level(&config.debug_level), &config.log_dir)?;

    log::info!("Using {} network parameters", config.network);

    let client = WsRpcClient::connect(&config.rpc_config())?;
    log::info!("Connected to the node successfully: {}", client.version()?);

    if config.profile {
        log::warn!("CPU profiling requested, but this build ships no profiling endpoints");
    }

    let source: Arc<dyn TxSource> = Arc::new(client);
    let app = explorer::router(AppState::new(source, &config));

    let address = format!("{}:{}", config.host, config.port);
    log::info!("Analysis server listening on {address}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&address).await?;
        axum::serve(listener, app).await
    })?;

    Ok(())
}
