//! Configuration models for argilla-remote.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Top-level configuration for argilla-remote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Argilla server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Request sizing for bulk record operations
    #[serde(default)]
    pub batching: BatchConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Argilla server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Argilla server
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (can also be set via ARGILLA_API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Workspace sent with every request, if any
    #[serde(default)]
    pub workspace: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum attempts for idempotent requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_url() -> String {
    "http://localhost:6900".to_string()
}

fn default_api_key_env() -> String {
    "ARGILLA_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            workspace: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Records per request for each bulk endpoint.
///
/// K_i: The delete endpoint caps ids per call independently of pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records per add/update request
    #[serde(default = "default_push_batch_size")]
    pub push_batch_size: usize,

    /// Record ids per delete request
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Records per page when iterating
    #[serde(default = "default_fetch_page_size")]
    pub fetch_page_size: usize,
}

pub const PUSHING_BATCH_SIZE: usize = 500;
pub const DELETE_DATASET_RECORDS_MAX_NUMBER: usize = 100;
pub const FETCHING_BATCH_SIZE: usize = 250;

fn default_push_batch_size() -> usize {
    PUSHING_BATCH_SIZE
}

fn default_delete_batch_size() -> usize {
    DELETE_DATASET_RECORDS_MAX_NUMBER
}

fn default_fetch_page_size() -> usize {
    FETCHING_BATCH_SIZE
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            push_batch_size: PUSHING_BATCH_SIZE,
            delete_batch_size: DELETE_DATASET_RECORDS_MAX_NUMBER,
            fetch_page_size: FETCHING_BATCH_SIZE,
        }
    }
}

impl BatchConfig {
    /// Reject zero-sized batches, which would never make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("push_batch_size", self.push_batch_size),
            ("delete_batch_size", self.delete_batch_size),
            ("fetch_page_size", self.fetch_page_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: name.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Master switch for progress bars on bulk pushes and updates
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Default path for pulled datasets
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.batching.validate()?;
        Ok(config)
    }

    /// Resolve API key from config or environment.
    ///
    /// B_i(api key available) → Result
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.server.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.server.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.server.api_key_env.clone(),
        })
    }

    /// Example configuration file.
    pub fn example() -> &'static str {
        r#"# argilla-remote configuration file

[server]
api_url = "http://localhost:6900"
# API key (can also use ARGILLA_API_KEY env var, ${VAR} is expanded)
# api_key = "argilla.apikey"
# workspace = "admin"
timeout_secs = 120
max_retries = 3

[batching]
push_batch_size = 500    # records per add/update request
delete_batch_size = 100  # record ids per delete request
fetch_page_size = 250    # records per page when iterating

[output]
show_progress = true
# path = "output/dataset.jsonl"
"#
    }
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or server.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
}
