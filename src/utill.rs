//! Various utility and helper functions for both the server and the client.

use std::{
    collections::HashMap,
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Once,
};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// The name of the log file created inside the log directory.
pub const LOG_FILENAME: &str = "chainflow.log";

static LOGGER: Once = Once::new();

/// Returns the application data directory, `~/.chainflow` by default.
pub fn get_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".chainflow")
}

/// Initializes the global logger with a terminal writer and a rotating
/// file writer inside `log_dir`. Safe to call more than once, only the
/// first call takes effect.
pub fn setup_logger(level: LevelFilter, log_dir: &Path) -> io::Result<()> {
    let mut result = Ok(());
    LOGGER.call_once(|| {
        result = (|| {
            fs::create_dir_all(log_dir)?;
            let log_file = fs::File::create(log_dir.join(LOG_FILENAME))?;

            let config = ConfigBuilder::new()
                .set_time_format_rfc3339()
                .build();

            let loggers: Vec<Box<dyn SharedLogger>> = vec![
                TermLogger::new(
                    level,
                    config.clone(),
                    TerminalMode::Stdout,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(level, config, log_file),
            ];

            CombinedLogger::init(loggers)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            Ok(())
        })();
    });
    result
}

/// Parse a debug level string into a [`LevelFilter`]. Unknown values
/// fall back to `Info` with a warning once logging is up.
pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Parses a config file into a key-value map.
///
/// The format is INI style: `key = value` lines, `[section]` headers
/// (ignored, sections only group keys visually) and `#` comments. Values
/// may be quoted; quotes are stripped.
pub fn parse_toml(file_path: &Path) -> io::Result<HashMap<String, String>> {
    let file = fs::File::open(file_path)?;
    let reader = io::BufReader::new(file);

    let mut map = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    Ok(map)
}

/// Parses a value of the config map into the target type, falling back
/// to `default` when the key is missing or does not parse.
pub fn parse_field<T: FromStr>(value: Option<&String>, default: T) -> T {
    value
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
