//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tickwatch_core::{Symbol, DEFAULT_COOLDOWN_MS};
use tickwatch_ws::{build_authenticated_url, ConnectionConfig, ReconnectConfig};

/// Environment variable holding the market-data API key.
pub const API_KEY_ENV: &str = "FINNHUB_API_KEY";

/// Prefix for environment overrides (`TICKWATCH__STREAM__BASE_URL`, ...).
pub const ENV_PREFIX: &str = "TICKWATCH";

/// Market-data stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket endpoint without credentials.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API token. Falls back to `FINNHUB_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    #[serde(default = "default_reconnect_growth_factor")]
    pub reconnect_growth_factor: f64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Maximum consecutive reconnection attempts (0 = infinite).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Reconnect after this long without any frame (0 = disabled).
    #[serde(default)]
    pub idle_timeout_ms: u64,
}

fn default_base_url() -> String {
    "wss://ws.finnhub.io".to_string()
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_initial_delay_ms() -> u64 {
    3_000
}

fn default_reconnect_growth_factor() -> f64 {
    1.3
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            connection_timeout_ms: default_connection_timeout_ms(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_growth_factor: default_reconnect_growth_factor(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            idle_timeout_ms: 0,
        }
    }
}

impl StreamConfig {
    /// Build the connection configuration, resolving the API key from the
    /// config or the environment.
    pub fn connection_config(&self) -> AppResult<ConnectionConfig> {
        let token = resolve_api_key(self.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())?;
        self.connection_config_with_token(&token)
    }

    pub fn connection_config_with_token(&self, token: &str) -> AppResult<ConnectionConfig> {
        let url = build_authenticated_url(&self.base_url, token)
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(ConnectionConfig {
            url,
            connection_timeout_ms: self.connection_timeout_ms,
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
                growth_factor: self.reconnect_growth_factor,
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                max_attempts: self.max_reconnect_attempts,
                ..Default::default()
            },
            idle_timeout_ms: self.idle_timeout_ms,
        })
    }
}

/// Pick the configured key, else the environment's. Blank values count as unset.
pub fn resolve_api_key(configured: Option<&str>, from_env: Option<String>) -> AppResult<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| from_env.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()))
        .ok_or_else(|| {
            AppError::Config(format!(
                "market-data API key missing: set stream.api_key or {API_KEY_ENV}"
            ))
        })
}

/// Alert seeded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub symbol: String,
    pub target_price: f64,
    /// Overrides `alerts.default_cooldown_ms`.
    #[serde(default)]
    pub cooldown_ms: Option<i64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Alert engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_cooldown_ms")]
    pub default_cooldown_ms: i64,
    /// JSON file keeping alerts across restarts. Unset keeps them in memory.
    #[serde(default)]
    pub store_path: Option<String>,
    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

fn default_cooldown_ms() -> i64 {
    DEFAULT_COOLDOWN_MS
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            default_cooldown_ms: default_cooldown_ms(),
            store_path: None,
            rules: Vec::new(),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// Symbols to stream when no alert rules exist.
    #[serde(default = "default_watch_symbols")]
    pub watch_symbols: Vec<String>,
}

fn default_watch_symbols() -> Vec<String> {
    vec!["AAPL".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            alerts: AlertsConfig::default(),
            watch_symbols: default_watch_symbols(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file with `TICKWATCH__SECTION__KEY` environment
    /// overrides. A missing file is an error.
    pub fn load(path: &str) -> AppResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file without environment overrides.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// The API key is checked later, when the connection is built, because
    /// it may come from the environment.
    pub fn validate(&self) -> AppResult<()> {
        let stream = &self.stream;
        if stream.base_url.trim().is_empty() {
            return Err(AppError::Config("stream.base_url is empty".to_string()));
        }
        if stream.connection_timeout_ms == 0 {
            return Err(AppError::Config(
                "stream.connection_timeout_ms must be positive".to_string(),
            ));
        }
        if stream.reconnect_initial_delay_ms == 0 {
            return Err(AppError::Config(
                "stream.reconnect_initial_delay_ms must be positive".to_string(),
            ));
        }
        if stream.reconnect_growth_factor.is_nan() || stream.reconnect_growth_factor < 1.0 {
            return Err(AppError::Config(format!(
                "stream.reconnect_growth_factor ({}) must be at least 1.0",
                stream.reconnect_growth_factor
            )));
        }
        if stream.reconnect_max_delay_ms < stream.reconnect_initial_delay_ms {
            return Err(AppError::Config(format!(
                "stream.reconnect_max_delay_ms ({}) must not be below \
                 reconnect_initial_delay_ms ({})",
                stream.reconnect_max_delay_ms, stream.reconnect_initial_delay_ms
            )));
        }

        if self
            .alerts
            .store_path
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(AppError::Config("alerts.store_path is empty".to_string()));
        }
        if self.alerts.default_cooldown_ms < 0 {
            return Err(AppError::Config(
                "alerts.default_cooldown_ms must be non-negative".to_string(),
            ));
        }
        for rule in &self.alerts.rules {
            Symbol::new(&rule.symbol)
                .map_err(|e| AppError::Config(format!("alerts.rules: {e}")))?;
            if !rule.target_price.is_finite() || rule.target_price <= 0.0 {
                return Err(AppError::Config(format!(
                    "alerts.rules: target_price for {} must be positive, got {}",
                    rule.symbol, rule.target_price
                )));
            }
            if rule.cooldown_ms.is_some_and(|c| c < 0) {
                return Err(AppError::Config(format!(
                    "alerts.rules: cooldown_ms for {} must be non-negative",
                    rule.symbol
                )));
            }
        }

        for symbol in &self.watch_symbols {
            Symbol::new(symbol).map_err(|e| AppError::Config(format!("watch_symbols: {e}")))?;
        }

        Ok(())
    }
}
