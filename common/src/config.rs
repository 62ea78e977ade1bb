// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

use crate::models::DEFAULT_AUTO_HIDE_MS;

/// Central configuration for the console and the stub backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the billing backend, without trailing slash
    pub backend_url: String,
    pub request_timeout_secs: u64,
    /// Log level name: trace, debug, info, warn or error
    pub log_level: String,

    pub session: SessionConfig,
    pub console: ConsoleConfig,
    pub stub: StubConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File holding the persisted token and expiry
    pub storage_path: String,
    pub notification_auto_hide_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Directory generated reports are written to
    pub reports_dir: String,
    pub page_size: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StubConfig {
    pub addr: String,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub admin_email: String,
    pub admin_password: String,
    /// Serve discount options as a JSON string holding the array
    pub double_encode_discounts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8090".to_string(),
            request_timeout_secs: 30,
            log_level: "info".to_string(),

            session: SessionConfig {
                storage_path: "./.credit-console/session.json".to_string(),
                notification_auto_hide_ms: DEFAULT_AUTO_HIDE_MS,
            },
            console: ConsoleConfig {
                reports_dir: "./reports".to_string(),
                page_size: 10,
            },
            stub: StubConfig {
                addr: "127.0.0.1:8090".to_string(),
                jwt_secret: "dev_secret".to_string(),
                token_ttl_secs: 3600,
                admin_email: "mail@mail.com".to_string(),
                admin_password: "ValidPass1&".to_string(),
                double_encode_discounts: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = ConfigFile::try_from(&Config::default())?;

        let config = ConfigFile::builder()
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__BACKEND_URL
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(url) = env::var("BACKEND_URL") {
                    config.backend_url = url;
                }
                if let Some(timeout) = env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    config.request_timeout_secs = timeout;
                }
                if let Ok(path) = env::var("SESSION_STORAGE_PATH") {
                    config.session.storage_path = path;
                }
                if let Ok(dir) = env::var("REPORTS_DIR") {
                    config.console.reports_dir = dir;
                }
                if let Ok(level) = env::var("LOG_LEVEL") {
                    config.log_level = level;
                }

                config
            }
        }
    }

    /// Backend URL with any trailing slash removed
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }
}
