//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::scheduler::{Priority, QueueDepthPolicy, SchedulerConfig};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Scheduler tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub max_concurrent: usize,
    pub default_priority: Priority,
    /// Enables the queue-depth admission policy when set
    pub max_queue_depth: Option<usize>,
    pub wait_poll_ms: u64,
    /// Upper bound on timeouts accepted by the wait endpoint
    pub max_wait_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            default_priority: Priority::Normal,
            max_queue_depth: None,
            wait_poll_ms: 10,
            max_wait_ms: 60_000,
        }
    }
}

impl SchedulerSettings {
    /// Build the scheduler configuration these settings describe
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::new()
            .with_max_concurrent(self.max_concurrent)
            .with_default_priority(self.default_priority)
            .with_wait_poll_interval(Duration::from_millis(self.wait_poll_ms));

        if let Some(depth) = self.max_queue_depth {
            config = config.with_policy(QueueDepthPolicy::new(depth));
        }
        config
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub scheduler: SchedulerSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let server = ServerConfig {
            host: parse_var(&lookup, "HOST")?.unwrap_or(defaults.server.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.server.port),
        };

        let cors = CorsConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors.allowed_origins),
        };

        let max_concurrent = parse_var(&lookup, "SCHEDULER_MAX_CONCURRENT")?
            .unwrap_or(defaults.scheduler.max_concurrent);
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                var: "SCHEDULER_MAX_CONCURRENT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let scheduler = SchedulerSettings {
            max_concurrent,
            default_priority: parse_var(&lookup, "SCHEDULER_DEFAULT_PRIORITY")?
                .unwrap_or(defaults.scheduler.default_priority),
            max_queue_depth: parse_var(&lookup, "SCHEDULER_MAX_QUEUE_DEPTH")?,
            wait_poll_ms: parse_var(&lookup, "SCHEDULER_WAIT_POLL_MS")?
                .unwrap_or(defaults.scheduler.wait_poll_ms),
            max_wait_ms: parse_var(&lookup, "SCHEDULER_MAX_WAIT_MS")?
                .unwrap_or(defaults.scheduler.max_wait_ms),
        };

        Ok(Self {
            server,
            cors,
            scheduler,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var: key.to_string(),
                message: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.scheduler.max_concurrent, 1);
        assert_eq!(settings.scheduler.default_priority, Priority::Normal);
        assert!(settings.scheduler.max_queue_depth.is_none());
        assert!(settings.scheduler.to_scheduler_config().policies.is_empty());
    }

    #[test]
    fn test_scheduler_vars() {
        let settings = Settings::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("SCHEDULER_MAX_CONCURRENT", "4"),
            ("SCHEDULER_DEFAULT_PRIORITY", "high"),
            ("SCHEDULER_MAX_QUEUE_DEPTH", "100"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test"),
        ]))
        .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.cors.allowed_origins, vec!["http://a.test", "http://b.test"]);

        let config = settings.scheduler.to_scheduler_config();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.default_priority, Priority::High);
        assert_eq!(config.policies.names(), vec!["queue-depth"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Settings::from_lookup(lookup(&[("PORT", "not-a-port")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SCHEDULER_MAX_CONCURRENT", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SCHEDULER_DEFAULT_PRIORITY", "urgent")])).is_err());
    }
}
