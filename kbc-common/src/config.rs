//! Configuration loading and bootstrap value resolution
//!
//! Every bootstrap value follows the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Backend URI used when nothing else is configured
pub const DEFAULT_BACKEND_URI: &str = "http://127.0.0.1:5000";
/// Address the local HTTP facade binds to by default
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";
/// Training an embedding can take minutes, so the default is generous
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Broadcast capacity for dashboard events
pub const DEFAULT_EVENT_CAPACITY: usize = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const ENV_BACKEND_URI: &str = "KBC_BACKEND_URI";
pub const ENV_BIND_ADDRESS: &str = "KBC_BIND_ADDRESS";
pub const ENV_LOG_LEVEL: &str = "KBC_LOG_LEVEL";

/// Bootstrap configuration loaded from TOML file
///
/// All fields are optional; anything missing falls through to the
/// compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URI of the extraction/embedding/evaluation backend
    #[serde(default)]
    pub backend_uri: Option<String>,

    /// Socket address for `kbc-dash serve`
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Per-request timeout applied by the backend HTTP client
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Dashboard event bus capacity
    #[serde(default)]
    pub event_capacity: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend_uri: Option<String>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved dashboard configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub backend_uri: String,
    pub bind_address: SocketAddr,
    pub request_timeout: Duration,
    pub event_capacity: usize,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl DashboardConfig {
    /// Resolve configuration from CLI → ENV → TOML → compiled defaults
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let backend_uri = resolve_value(
            cli.backend_uri.as_deref(),
            ENV_BACKEND_URI,
            toml_config.backend_uri.as_deref(),
            DEFAULT_BACKEND_URI,
        );
        let backend_uri = normalize_backend_uri(&backend_uri)?;

        let bind_address = resolve_value(
            cli.bind_address.as_deref(),
            ENV_BIND_ADDRESS,
            toml_config.bind_address.as_deref(),
            DEFAULT_BIND_ADDRESS,
        );
        let bind_address: SocketAddr = bind_address
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_address, e)))?;

        let log_level = resolve_value(
            cli.log_level.as_deref(),
            ENV_LOG_LEVEL,
            toml_config.logging.level.as_deref(),
            DEFAULT_LOG_LEVEL,
        );

        let timeout_secs = toml_config
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            backend_uri,
            bind_address,
            request_timeout: Duration::from_secs(timeout_secs),
            event_capacity: toml_config
                .event_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
            log_level,
            log_file: toml_config.logging.file.clone(),
        })
    }
}

/// Pick the first non-blank value in priority order
fn resolve_value(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
    default: &str,
) -> String {
    // Priority 1: Command-line argument
    if let Some(value) = cli_arg.filter(|v| !v.trim().is_empty()) {
        return value.trim().to_string();
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var_name) {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }

    // Priority 3: TOML config file
    if let Some(value) = toml_value.filter(|v| !v.trim().is_empty()) {
        return value.trim().to_string();
    }

    // Priority 4: Compiled default
    default.to_string()
}

/// Validate the scheme and drop trailing slashes so paths can be appended
fn normalize_backend_uri(uri: &str) -> Result<String> {
    if !(uri.starts_with("http://") || uri.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Backend URI must start with http:// or https://, got '{}'",
            uri
        )));
    }
    Ok(uri.trim_end_matches('/').to_string())
}

/// Platform config file location: `<config_dir>/kbc-ops/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kbc-ops").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Load the TOML config with graceful degradation
///
/// An explicitly requested file must exist and parse. The platform default
/// file is optional: missing or malformed means defaults plus a warning.
pub fn load_toml_config_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    let Some(path) = default_config_path() else {
        warn!("Could not determine config directory, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            Ok(TomlConfig::default())
        }
    }
}

/// Serialize a config to TOML text
pub fn to_toml_string(config: &TomlConfig) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))
}
