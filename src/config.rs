use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::retry::BackoffStrategy;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Upstream API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

/// Circuit breaker thresholds and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_seconds: u64,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
}

/// Retry attempts and backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// One of "fixed", "linear", "exponential", "exponential-jitter".
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

/// Response cache sizing and TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_size")]
    pub max_size: usize,
    /// Fixtures change rarely; cache them for minutes.
    #[serde(default = "default_fixtures_ttl")]
    pub fixtures_ttl_seconds: u64,
    /// A lineup can flip from absent to published at any moment; keep short.
    #[serde(default = "default_lineup_ttl")]
    pub lineup_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

/// Monitoring loop cadence and windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,
    /// Matches kicking off within this window enter the watch-list.
    #[serde(default = "default_lead_window")]
    pub lead_window_minutes: u64,
    /// Inside this window before kickoff, polling runs at maximum frequency.
    #[serde(default = "default_final_sprint")]
    pub final_sprint_minutes: u64,
    #[serde(default = "default_sprint_interval")]
    pub final_sprint_interval_minutes: u64,
    /// Minimum spacing between lineup checks for the same match outside
    /// the final sprint.
    #[serde(default = "default_min_check_interval")]
    pub min_check_interval_minutes: u64,
    #[serde(default = "default_max_cycles")]
    pub max_cycles_per_day: u32,
    /// Seconds granted to in-flight checks when shutdown is requested.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Whether as-expected confirmations produce info alerts.
    #[serde(default)]
    pub send_confirmations: bool,
}

/// Outbound notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Chat-style webhook URL. Falls back to the WEBHOOK_URL env var.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub send_startup: bool,
    #[serde(default = "default_true")]
    pub send_shutdown: bool,
}

fn default_base_url() -> String {
    crate::UPSTREAM_API_BASE.to_string()
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_rate_limit() -> u32 {
    60
}
fn default_max_concurrent() -> usize {
    5
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_timeout() -> u64 {
    60
}
fn default_success_threshold() -> u32 {
    3
}
fn default_call_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_strategy() -> String {
    "exponential-jitter".to_string()
}
fn default_cache_size() -> usize {
    500
}
fn default_fixtures_ttl() -> u64 {
    600
}
fn default_lineup_ttl() -> u64 {
    120
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_check_interval() -> u64 {
    15
}
fn default_lead_window() -> u64 {
    60
}
fn default_final_sprint() -> u64 {
    30
}
fn default_sprint_interval() -> u64 {
    1
}
fn default_min_check_interval() -> u64 {
    5
}
fn default_max_cycles() -> u32 {
    200
}
fn default_shutdown_grace() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            rate_limit_per_minute: default_rate_limit(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_seconds: default_recovery_timeout(),
            success_threshold: default_success_threshold(),
            call_timeout_seconds: default_call_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            strategy: default_strategy(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_size(),
            fixtures_ttl_seconds: default_fixtures_ttl(),
            lineup_ttl_seconds: default_lineup_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: default_check_interval(),
            lead_window_minutes: default_lead_window(),
            final_sprint_minutes: default_final_sprint(),
            final_sprint_interval_minutes: default_sprint_interval(),
            min_check_interval_minutes: default_min_check_interval(),
            max_cycles_per_day: default_max_cycles(),
            shutdown_grace_seconds: default_shutdown_grace(),
            send_confirmations: false,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            send_startup: true,
            send_shutdown: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            monitoring: MonitoringConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn backoff_strategy(&self) -> Result<BackoffStrategy> {
        self.strategy
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .with_context(|| format!("invalid retry strategy {:?}", self.strategy))
    }
}

impl AppConfig {
    /// Load config from the given TOML file path. A missing file yields the
    /// built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints. Invalid config is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.api.rate_limit_per_minute == 0 {
            bail!("api.rate_limit_per_minute must be positive");
        }
        if self.api.max_concurrent_requests == 0 {
            bail!("api.max_concurrent_requests must be positive");
        }
        if self.api.timeout_seconds == 0 {
            bail!("api.timeout_seconds must be positive");
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            bail!("api.base_url must start with http:// or https://");
        }
        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            bail!("breaker thresholds must be positive");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be positive");
        }
        self.retry.backoff_strategy()?;
        if self.cache.max_size == 0 {
            bail!("cache.max_size must be positive");
        }
        if self.monitoring.check_interval_minutes == 0 {
            bail!("monitoring.check_interval_minutes must be positive");
        }
        if self.monitoring.final_sprint_interval_minutes >= self.monitoring.final_sprint_minutes {
            bail!("monitoring.final_sprint_interval_minutes must be below the sprint window");
        }
        if self.monitoring.lead_window_minutes == 0 {
            bail!("monitoring.lead_window_minutes must be positive");
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker.call_timeout_seconds)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker.recovery_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config is valid");
        assert_eq!(config.api.rate_limit_per_minute, 60);
        assert_eq!(config.monitoring.check_interval_minutes, 15);
        assert_eq!(config.cache.fixtures_ttl_seconds, 600);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [monitoring]
            check_interval_minutes = 5
            final_sprint_minutes = 10
            "#,
        )
        .expect("partial config parses");
        assert_eq!(config.monitoring.check_interval_minutes, 5);
        assert_eq!(config.monitoring.final_sprint_minutes, 10);
        assert_eq!(config.api.timeout_seconds, 30);
    }

    #[test]
    fn invalid_strategy_rejected() {
        let config: AppConfig = toml::from_str(
            r#"
            [retry]
            strategy = "quadratic"
            "#,
        )
        .expect("parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn sprint_interval_must_fit_window() {
        let config: AppConfig = toml::from_str(
            r#"
            [monitoring]
            final_sprint_minutes = 2
            final_sprint_interval_minutes = 2
            "#,
        )
        .expect("parses");
        assert!(config.validate().is_err());
    }
}
