//! Operator configuration read from the environment

use std::time::Duration;

use thiserror::Error;

/// Namespace to restrict watches to; unset or empty watches all namespaces
pub const WATCH_NAMESPACE_ENV: &str = "WATCH_NAMESPACE";
pub const HEALTH_PORT_ENV: &str = "HEALTH_PORT";
pub const SHUTDOWN_GRACE_PERIOD_ENV: &str = "SHUTDOWN_GRACE_PERIOD_SECS";

pub const DEFAULT_HEALTH_PORT: u16 = 8080;
/// Grace period for in-flight reconciliations to complete during shutdown
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub watch_namespace: Option<String>,
    pub health_port: u16,
    pub shutdown_grace_period: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            health_port: DEFAULT_HEALTH_PORT,
            shutdown_grace_period: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_PERIOD_SECS),
        }
    }
}

impl OperatorConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let watch_namespace = lookup(WATCH_NAMESPACE_ENV)
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        let health_port = match lookup(HEALTH_PORT_ENV) {
            Some(raw) => parse_var(HEALTH_PORT_ENV, &raw)?,
            None => defaults.health_port,
        };

        let shutdown_grace_period = match lookup(SHUTDOWN_GRACE_PERIOD_ENV) {
            Some(raw) => Duration::from_secs(parse_var(SHUTDOWN_GRACE_PERIOD_ENV, &raw)?),
            None => defaults.shutdown_grace_period,
        };

        Ok(Self {
            watch_namespace,
            health_port,
            shutdown_grace_period,
        })
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
