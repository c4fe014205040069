use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::mcp::methods::MethodTable;

pub const DEFAULT_BIND_PORT: u16 = 8074;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_EVENT_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub heartbeat_interval: Duration,
    pub event_interval: Duration,
    pub disabled_methods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("{0} must be a positive number of seconds")]
    InvalidInterval(&'static str),
    #[error("MCP_DISABLED_METHODS names an unknown method: {0}")]
    UnknownMethod(String),
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = lookup("BIND_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort)
            })
            .transpose()?
            .unwrap_or(DEFAULT_BIND_PORT);
        let heartbeat_interval =
            parse_interval(&lookup, "MCP_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS)?;
        let event_interval =
            parse_interval(&lookup, "MCP_EVENT_INTERVAL_SECS", DEFAULT_EVENT_INTERVAL_SECS)?;
        let disabled_methods = lookup("MCP_DISABLED_METHODS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|method| !method.is_empty())
                    .map(|method| {
                        if MethodTable::is_known(method) {
                            Ok(method.to_string())
                        } else {
                            Err(ConfigError::UnknownMethod(method.to_string()))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            bind_addr,
            bind_port,
            heartbeat_interval,
            event_interval,
            disabled_methods,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn parse_interval(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default_secs: u64,
) -> Result<Duration, ConfigError> {
    let secs = lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidInterval(key))
        })
        .transpose()?
        .unwrap_or(default_secs);

    if secs == 0 {
        return Err(ConfigError::InvalidInterval(key));
    }
    Ok(Duration::from_secs(secs))
}
