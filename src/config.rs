//! Bot configuration
//!
//! Loaded from `config.yml` when present; environment variables (and a `.env`
//! file) take precedence. YAML values written as `${VAR}` are read from the
//! named environment variable.

use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::integrations::adsterra::{ADSTERRA_API_URL, DEFAULT_TIMEOUT};
use crate::session::DEFAULT_SESSION_TTL;
use crate::{Error, Result};

/// Default config file name.
pub const CONFIG_FILE: &str = "config.yml";
/// Default credential store file.
pub const USERS_FILE: &str = "users.json";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramConfig>,
    adsterra: Option<AdsterraConfig>,
    storage: Option<StorageConfig>,
    session: Option<SessionConfig>,
    metrics: Option<MetricsConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdsterraConfig {
    api_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    timeout_secs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageConfig {
    users_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    ttl_secs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MetricsConfig {
    addr: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token; only required by `run`.
    pub telegram_token: Option<String>,
    pub api_url: String,
    pub request_timeout: Duration,
    pub users_file: PathBuf,
    pub session_ttl: Duration,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: None,
            api_url: ADSTERRA_API_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            users_file: PathBuf::from(USERS_FILE),
            session_ttl: DEFAULT_SESSION_TTL,
            metrics_addr: None,
        }
    }
}

impl Config {
    /// Load `path` if given (it must exist), otherwise `config.yml` if it
    /// exists, otherwise defaults. Environment variables apply on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_dotenv();

        let yaml = match path {
            Some(path) => Self::read_yaml(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::read_yaml(Path::new(CONFIG_FILE))?,
            None => YamlConfig::default(),
        };

        Self::from_yaml(yaml)
    }

    /// Parse configuration from YAML text. Environment variables apply on top.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: YamlConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
        Self::from_yaml(yaml)
    }

    /// Bot token or a configuration error naming the variable to set.
    pub fn require_token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN is not set".to_string()))
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    fn read_yaml(path: &Path) -> Result<YamlConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    fn from_yaml(yaml: YamlConfig) -> Result<Self> {
        let defaults = Self::default();
        let telegram = yaml.telegram.unwrap_or_default();
        let adsterra = yaml.adsterra.unwrap_or_default();
        let storage = yaml.storage.unwrap_or_default();
        let session = yaml.session.unwrap_or_default();
        let metrics = yaml.metrics.unwrap_or_default();

        let telegram_token = Self::resolve_env_string(telegram.token, "TELEGRAM_BOT_TOKEN");
        let api_url = Self::resolve_env_string(adsterra.api_url, "ADSTERRA_API_URL")
            .unwrap_or(defaults.api_url);
        let request_timeout =
            Self::resolve_env_secs(adsterra.timeout_secs, "ADSTERRA_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout);
        let users_file = Self::resolve_env_string(storage.users_file, "USERS_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.users_file);
        let session_ttl = Self::resolve_env_secs(session.ttl_secs, "SESSION_TTL_SECS")?
            .unwrap_or(defaults.session_ttl);
        let metrics_addr = Self::resolve_env_string(metrics.addr, "METRICS_ADDR")
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .map_err(|e| Error::Config(format!("Invalid metrics address {}: {}", addr, e)))
            })
            .transpose()?;

        Ok(Self {
            telegram_token,
            api_url,
            request_timeout,
            users_file,
            session_ttl,
            metrics_addr,
        })
    }

    /// Resolve a value: env var wins, then `${VAR}` indirection, then the
    /// literal YAML value. Empty strings count as unset.
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Ok(env_val) = std::env::var(env_key) {
            if !env_val.is_empty() {
                return Some(env_val);
            }
        }

        let value = value?;
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            return std::env::var(var_name).ok().filter(|v| !v.is_empty());
        }

        Some(value).filter(|v| !v.is_empty())
    }

    fn resolve_env_secs(value: Option<String>, env_key: &str) -> Result<Option<Duration>> {
        Self::resolve_env_string(value, env_key)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| Error::Config(format!("{} must be a number of seconds: {}", env_key, e)))
            })
            .transpose()
    }
}
