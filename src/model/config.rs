use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_CONFIG_PATH: &str = "CIVICSIGHT_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_CONFIDENCE_THRESHOLD: &str = "CONFIDENCE_THRESHOLD";
const ENV_SCRIPTS_DIR: &str = "SCRIPTS_DIR";
const ENV_UPLOAD_DIR: &str = "UPLOAD_DIR";

/// Default minimum classification confidence for a report to proceed.
/// Boundary inclusive: a confidence exactly at the threshold is accepted.
const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Search polling configuration for the async SERP job
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPollConfig {
    /// Maximum number of snapshot polls before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed interval between polls, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Overall deadline for the whole polling loop, in seconds
    #[serde(default = "default_overall_cap_secs")]
    pub overall_cap_secs: u64,
}

fn default_max_attempts() -> u32 {
    30
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_overall_cap_secs() -> u64 {
    90
}

impl Default for SearchPollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_poll_interval_secs(),
            overall_cap_secs: default_overall_cap_secs(),
        }
    }
}

impl SearchPollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn overall_cap(&self) -> Duration {
        Duration::from_secs(self.overall_cap_secs)
    }
}

/// Automation adapter execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Hard timeout for one adapter process invocation, in seconds.
    /// Slow adapters may need up to 300.
    #[serde(default = "default_adapter_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory holding the automation scripts
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
}

fn default_adapter_timeout_secs() -> u64 {
    120
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts/sf-forms")
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_adapter_timeout_secs(),
            scripts_dir: default_scripts_dir(),
        }
    }
}

impl AdapterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub search: SearchPollConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchPollConfig,
    pub adapter: AdapterConfig,
    pub confidence_threshold: f64,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchPollConfig::default(),
            adapter: AdapterConfig::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            upload_dir: PathBuf::from("uploads"),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let confidence_threshold = std::env::var(ENV_CONFIDENCE_THRESHOLD)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);

        let upload_dir = std::env::var(ENV_UPLOAD_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        // Load config file
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        let mut adapter = file.adapter;
        if let Ok(dir) = std::env::var(ENV_SCRIPTS_DIR) {
            adapter.scripts_dir = PathBuf::from(dir);
        }

        Self {
            search: file.search,
            adapter,
            confidence_threshold,
            upload_dir,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                // Handle empty file
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match serde_yaml::from_str(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
