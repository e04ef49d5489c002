//! Configuration management for Bookgate.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `BOOKGATE_` environment variables (`BOOKGATE_RATE_LIMITER__RATE=5`).
//! The rate limiter's `rate` and `burst` have no defaults and must be provided.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::ratelimit::Quota;

/// Environment variable prefix.
const ENV_PREFIX: &str = "BOOKGATE";

/// Main configuration for the Bookgate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name (e.g. "development", "production")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    pub rate_limiter: RateLimiterConfig,

    /// Localization configuration
    #[serde(default)]
    pub i18n: I18nConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Health check configuration
    #[serde(default)]
    pub health: HealthConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8888))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Tokens added per second to each client's bucket
    pub rate: f64,

    /// Bucket capacity per client
    pub burst: u32,

    /// How often idle clients are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Idle time after which a client's bucket is dropped, in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// Only enable behind a proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    300
}

impl RateLimiterConfig {
    /// Create a configuration with the given rate and burst and default sweeping.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst,
            sweep_interval_secs: default_sweep_interval(),
            idle_timeout_secs: default_idle_timeout(),
            trust_proxy: false,
        }
    }

    /// The per-client quota.
    pub fn quota(&self) -> Quota {
        Quota::new(self.rate, self.burst)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Localization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I18nConfig {
    /// Language used when the request language has no catalog
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Languages to load
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Directory holding `<lang>.json` catalogs; built-in catalogs when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            languages: default_languages(),
            directory: None,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["vi".to_string(), "en".to_string()]
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Health check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Version reported by the health endpoints
    #[serde(default = "default_version")]
    pub version: String,

    /// Downstream dependencies probed by `/health` and `/health/ready`
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            dependencies: Vec::new(),
        }
    }
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// A downstream dependency reachable over TCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Name shown in health details (e.g. "database")
    pub name: String,

    /// `host:port` to connect to
    pub address: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

fn default_probe_timeout() -> u64 {
    2000
}

impl AppConfig {
    /// Create a configuration with defaults everywhere except the rate limiter.
    pub fn new(rate_limiter: RateLimiterConfig) -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            rate_limiter,
            i18n: I18nConfig::default(),
            logging: LoggingConfig::default(),
            health: HealthConfig::default(),
        }
    }

    /// Load configuration from an optional YAML file and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<()> {
        let limiter = &self.rate_limiter;

        if !limiter.rate.is_finite() || limiter.rate <= 0.0 {
            return Err(AppError::Config(format!(
                "rate_limiter.rate must be a positive number, got {}",
                limiter.rate
            )));
        }
        if limiter.burst == 0 {
            return Err(AppError::Config("rate_limiter.burst must be at least 1".to_string()));
        }
        if limiter.sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "rate_limiter.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.i18n.default_language.is_empty() {
            return Err(AppError::Config("i18n.default_language must not be empty".to_string()));
        }

        Ok(())
    }

    /// Whether the service runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
rate_limiter:
  rate: 5
  burst: 10
"#;
        let config = assert_ok!(AppConfig::from_yaml(yaml));

        assert_eq!(config.rate_limiter.quota(), Quota::new(5.0, 10));
        assert_eq!(config.rate_limiter.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.rate_limiter.idle_timeout(), Duration::from_secs(300));
        assert!(!config.rate_limiter.trust_proxy);
        assert_eq!(config.server.http_addr.port(), 8888);
        assert_eq!(config.i18n.default_language, "en");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.is_production());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
environment: production
server:
  http_addr: "127.0.0.1:9000"
rate_limiter:
  rate: 2.5
  burst: 4
  sweep_interval_secs: 10
  idle_timeout_secs: 60
  trust_proxy: true
i18n:
  default_language: vi
  languages: [vi]
logging:
  level: debug
  format: pretty
health:
  version: "1.0.0"
  dependencies:
    - name: database
      address: "127.0.0.1:3306"
"#;
        let config = assert_ok!(AppConfig::from_yaml(yaml));

        assert!(config.is_production());
        assert_eq!(config.server.http_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.rate_limiter.rate, 2.5);
        assert!(config.rate_limiter.trust_proxy);
        assert_eq!(config.i18n.languages, vec!["vi".to_string()]);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.health.dependencies.len(), 1);
        assert_eq!(config.health.dependencies[0].timeout_ms, 2000);
    }

    #[test]
    fn test_rate_and_burst_are_required() {
        assert_err!(AppConfig::from_yaml("rate_limiter:\n  rate: 5\n"));
        assert_err!(AppConfig::from_yaml("rate_limiter:\n  burst: 5\n"));
        assert_err!(AppConfig::from_yaml("server:\n  http_addr: \"127.0.0.1:80\"\n"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::new(RateLimiterConfig::new(5.0, 10));
        assert_ok!(config.validate());

        config.rate_limiter.rate = 0.0;
        assert_err!(config.validate());

        config.rate_limiter = RateLimiterConfig::new(5.0, 0);
        assert_err!(config.validate());

        config.rate_limiter = RateLimiterConfig::new(f64::NAN, 1);
        assert_err!(config.validate());

        config.rate_limiter = RateLimiterConfig::new(5.0, 10);
        config.rate_limiter.sweep_interval_secs = 0;
        assert_err!(config.validate());
    }

    #[test]
    fn test_load_missing_file_without_limits_fails() {
        let result = AppConfig::load(Path::new("/nonexistent/bookgate.yaml"));
        assert!(result.is_err());
    }
}
