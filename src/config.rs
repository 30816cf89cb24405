//! Signaling server configuration.
//!
//! Values come from `SIGNAL_*` environment variables, falling back to
//! defaults. The auth token is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Maximum number of participants in one room. Not configurable.
pub const ROOM_CAPACITY: usize = 4;

#[derive(Clone)]
pub struct Config {
    /// Socket address the HTTP listener binds to.
    pub bind_address: String,

    /// Largest inbound frame accepted, in bytes. Bigger frames end the session.
    pub max_message_size: usize,

    /// Read deadline, refreshed by every inbound frame including pongs.
    pub read_timeout: Duration,

    /// Deadline applied to each outbound write burst.
    pub write_timeout: Duration,

    /// Period of the liveness ping. Must be shorter than `read_timeout`.
    pub ping_interval: Duration,

    /// Slots in each session's outbound queue.
    pub send_queue_capacity: usize,

    pub room_capacity: usize,

    /// Shared token required at admission. `None` admits everyone.
    pub auth_token: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("max_message_size", &self.max_message_size)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("send_queue_capacity", &self.send_queue_capacity)
            .field("room_capacity", &self.room_capacity)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            room_capacity: ROOM_CAPACITY,
            auth_token: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Unparsable { name: String, value: String },

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_address = vars
            .get("SIGNAL_BIND_ADDRESS")
            .cloned()
            .unwrap_or(defaults.bind_address);

        let max_message_size =
            parse_or(vars, "SIGNAL_MAX_MESSAGE_SIZE", defaults.max_message_size)?;
        let read_timeout = parse_or(vars, "SIGNAL_READ_TIMEOUT_SECS", DEFAULT_READ_TIMEOUT_SECS)?;
        let write_timeout =
            parse_or(vars, "SIGNAL_WRITE_TIMEOUT_SECS", DEFAULT_WRITE_TIMEOUT_SECS)?;
        let ping_interval =
            parse_or(vars, "SIGNAL_PING_INTERVAL_SECS", DEFAULT_PING_INTERVAL_SECS)?;
        let send_queue_capacity = parse_or(
            vars,
            "SIGNAL_SEND_QUEUE_CAPACITY",
            defaults.send_queue_capacity,
        )?;

        let auth_token = vars
            .get("SIGNAL_AUTH_TOKEN")
            .filter(|token| !token.is_empty())
            .cloned();

        let config = Self {
            bind_address,
            max_message_size,
            read_timeout: Duration::from_secs(read_timeout),
            write_timeout: Duration::from_secs(write_timeout),
            ping_interval: Duration::from_secs(ping_interval),
            send_queue_capacity,
            room_capacity: ROOM_CAPACITY,
            auth_token,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.send_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "send_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.room_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "room_capacity must be greater than zero".to_string(),
            ));
        }
        if self.write_timeout.is_zero() || self.ping_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "timeouts and intervals must be greater than zero".to_string(),
            ));
        }
        if self.ping_interval >= self.read_timeout {
            return Err(ConfigError::InvalidValue(format!(
                "ping_interval ({:?}) must be shorter than read_timeout ({:?})",
                self.ping_interval, self.read_timeout
            )));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Unparsable {
            name: name.to_string(),
            value: value.clone(),
        }),
        None => Ok(default),
    }
}
