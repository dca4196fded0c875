//! config-rs/lib.rs
//! Configuration for the status gateway.
//! Values come from a `ConfigProvider` (environment by default) and are
//! validated once at startup; nothing downstream reads the environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub mod provider;

pub use provider::{ConfigProvider, ConfigProviderExt, EnvConfigProvider, MemoryConfigProvider};

/// Environment prefix used by the gateway binary
pub const ENV_PREFIX: &str = "GATEWAY";

pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_POLLING_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_TRIGGER_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration key not set: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Time budgets per endpoint class, plus per-endpoint overrides keyed by upstream path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub health: Duration,
    pub polling: Duration,
    pub trigger: Duration,
    pub overrides: HashMap<String, Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            health: Duration::from_millis(DEFAULT_HEALTH_TIMEOUT_MS),
            polling: Duration::from_millis(DEFAULT_POLLING_TIMEOUT_MS),
            trigger: Duration::from_millis(DEFAULT_TRIGGER_TIMEOUT_MS),
            overrides: HashMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Override configured for an upstream endpoint path, if any
    pub fn override_for(&self, endpoint: &str) -> Option<Duration> {
        self.overrides.get(endpoint).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Extra attempts after the first one. 0 disables retries.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub upstream_url: String,
    pub bind_addr: SocketAddr,
    /// Identities allowed on administrative routes. Empty disables the guard.
    pub admin_identities: Vec<String>,
    pub timeouts: TimeoutConfig,
    pub retry: RetrySettings,
    pub logging: LogSettings,
}

impl GatewayConfig {
    /// Load `.env` (if present) and read the configuration from `GATEWAY_*` variables
    pub fn from_env() -> Result<Self> {
        if dotenv::dotenv().is_ok() {
            log::debug!("Loaded .env file");
        }
        Self::from_provider(&EnvConfigProvider::new().with_prefix(ENV_PREFIX))
    }

    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let upstream_url = provider
            .get_string_or("upstream_url", DEFAULT_UPSTREAM_URL)
            .trim_end_matches('/')
            .to_string();

        let bind_raw = provider.get_string_or("bind_addr", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("bind_addr", format!("'{}': {}", bind_raw, e)))?;

        let timeouts = TimeoutConfig {
            health: millis(provider, "health_timeout_ms", DEFAULT_HEALTH_TIMEOUT_MS)?,
            polling: millis(provider, "polling_timeout_ms", DEFAULT_POLLING_TIMEOUT_MS)?,
            trigger: millis(provider, "trigger_timeout_ms", DEFAULT_TRIGGER_TIMEOUT_MS)?,
            overrides: parse_overrides(&provider.get_string_or("timeout_overrides", ""))?,
        };

        let max_retries = provider.get_u64_or("upstream_retries", 0)?;
        let retry = RetrySettings {
            max_retries: u32::try_from(max_retries)
                .map_err(|_| ConfigError::invalid("upstream_retries", "value too large"))?,
            initial_backoff: millis(provider, "retry_backoff_ms", DEFAULT_RETRY_BACKOFF_MS)?,
        };

        let logging = LogSettings {
            level: provider.get_string_or("log_level", "info"),
            json: provider.get_bool_or("log_json", false)?,
        };

        let config = Self {
            upstream_url,
            bind_addr,
            admin_identities: provider.get_list("admin_identities"),
            timeouts,
            retry,
            logging,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream_url.is_empty() {
            return Err(ConfigError::invalid("upstream_url", "upstream base URL is required"));
        }

        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "upstream_url",
                format!("'{}' must start with http:// or https://", self.upstream_url),
            ));
        }

        let budgets = [
            ("health_timeout_ms", self.timeouts.health),
            ("polling_timeout_ms", self.timeouts.polling),
            ("trigger_timeout_ms", self.timeouts.trigger),
        ];
        for (key, budget) in budgets {
            if budget.is_zero() {
                return Err(ConfigError::invalid(key, "timeout must be greater than zero"));
            }
        }

        if let Some((endpoint, _)) = self.timeouts.overrides.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::invalid(
                "timeout_overrides",
                format!("override for {} must be greater than zero", endpoint),
            ));
        }

        Ok(())
    }

    /// Whether the administrative allow-list is active
    pub fn admin_guard_enabled(&self) -> bool {
        !self.admin_identities.is_empty()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_identities: Vec::new(),
            timeouts: TimeoutConfig::default(),
            retry: RetrySettings::default(),
            logging: LogSettings::default(),
        }
    }
}

fn millis<P: ConfigProvider + ?Sized>(provider: &P, key: &str, default: u64) -> Result<Duration> {
    provider.get_u64_or(key, default).map(Duration::from_millis)
}

/// Parse `"/logs=20000,/stats=8000"` into endpoint -> budget
fn parse_overrides(raw: &str) -> Result<HashMap<String, Duration>> {
    let mut overrides = HashMap::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (endpoint, ms) = entry.split_once('=').ok_or_else(|| {
            ConfigError::invalid("timeout_overrides", format!("expected <path>=<ms>, got '{}'", entry))
        })?;

        let ms = ms.trim().parse::<u64>().map_err(|e| {
            ConfigError::invalid("timeout_overrides", format!("'{}': {}", entry, e))
        })?;

        let endpoint = endpoint.trim();
        let endpoint = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };

        overrides.insert(endpoint, Duration::from_millis(ms));
    }

    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = GatewayConfig::from_provider(&MemoryConfigProvider::new()).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert!(!config.admin_guard_enabled());
    }

    #[test]
    fn test_full_configuration() {
        let provider = MemoryConfigProvider::new()
            .with("upstream_url", "https://tunnel.example.com/")
            .with("bind_addr", "127.0.0.1:9000")
            .with("admin_identities", "ops@example.com,admin@example.com")
            .with("health_timeout_ms", "2500")
            .with("timeout_overrides", "/logs=20000, stats=8000")
            .with("upstream_retries", "2")
            .with("log_json", "true");

        let config = GatewayConfig::from_provider(&provider).unwrap();
        assert_eq!(config.upstream_url, "https://tunnel.example.com");
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(config.admin_guard_enabled());
        assert_eq!(config.timeouts.health, Duration::from_millis(2500));
        assert_eq!(config.timeouts.polling, Duration::from_millis(DEFAULT_POLLING_TIMEOUT_MS));
        assert_eq!(config.timeouts.override_for("/logs"), Some(Duration::from_secs(20)));
        assert_eq!(config.timeouts.override_for("/stats"), Some(Duration::from_secs(8)));
        assert_eq!(config.timeouts.override_for("/health"), None);
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.logging.json);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let bad_url = MemoryConfigProvider::new().with("upstream_url", "ftp://upstream");
        assert!(GatewayConfig::from_provider(&bad_url).is_err());

        let zero_timeout = MemoryConfigProvider::new().with("polling_timeout_ms", "0");
        assert!(GatewayConfig::from_provider(&zero_timeout).is_err());

        let bad_override = MemoryConfigProvider::new().with("timeout_overrides", "/logs:100");
        assert!(GatewayConfig::from_provider(&bad_override).is_err());

        let bad_bind = MemoryConfigProvider::new().with("bind_addr", "localhost");
        assert!(GatewayConfig::from_provider(&bad_bind).is_err());
    }
}
