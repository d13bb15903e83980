use config::{ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration: one section per concern.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

/// Seat cache; disabled when no URL is configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Simulated,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub mode: PaymentMode,
    pub currency: String,
    /// Upper bound on a single gateway call; elapsing counts as a failed payment.
    pub timeout_ms: u64,
    /// Lets a booking be paid again after a failed attempt.
    pub allow_retry_after_failure: bool,
    pub simulated_delay_ms: u64,
    pub simulated_approve: bool,
    pub gateway_url: String,
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default)]
    pub merchant_password: String,
}

impl PaymentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

const DEFAULTS: &str = r#"
[app]
host = "0.0.0.0"
port = 8000
environment = "development"
rust_log = "carpool_system=debug,tower_http=debug"
log_format = "pretty"

[database]
pool_size = 20
acquire_timeout_secs = 5

[payment]
mode = "simulated"
currency = "INR"
timeout_ms = 10000
allow_retry_after_failure = false
simulated_delay_ms = 1000
simulated_approve = true
gateway_url = "http://localhost:9000"

[circuit_breaker]
failure_threshold = 5
timeout_seconds = 60
"#;

impl Config {
    /// Defaults overlaid with `CARPOOL__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("CARPOOL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml_str(overrides: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
