use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const ADDR_VAR: &str = "MARRIAGE_BOT_ADDR";
pub const STATE_VAR: &str = "MARRIAGE_BOT_STATE";
pub const SECRET_VAR: &str = "MARRIAGE_BOT_WEBHOOK_SECRET";

const DEFAULT_ADDR: &str = "127.0.0.1:8443";
const DEFAULT_STATE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var}={value:?} is not a socket address: {source}")]
    Addr {
        var: &'static str,
        value: String,
        source: AddrParseError,
    },
    #[error("{0} may only contain A-Z, a-z, 0-9, '_' and '-' (1 to 256 characters)")]
    Secret(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub state_path: PathBuf,
    /// Shared with Telegram through `setWebhook`: it is both the last path
    /// segment of the webhook URL and the `secret_token`.
    pub webhook_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr: SocketAddr = raw_addr.parse().map_err(|source| ConfigError::Addr {
            var: ADDR_VAR,
            value: raw_addr.clone(),
            source,
        })?;
        let state_path: PathBuf = lookup(STATE_VAR)
            .unwrap_or_else(|| DEFAULT_STATE.into())
            .into();
        let webhook_secret = lookup(SECRET_VAR).ok_or(ConfigError::Missing(SECRET_VAR))?;
        if !is_valid_secret(&webhook_secret) {
            return Err(ConfigError::Secret(SECRET_VAR));
        }

        Ok(Config {
            addr,
            state_path,
            webhook_secret,
        })
    }
}

fn is_valid_secret(secret: &str) -> bool {
    (1..=256).contains(&secret.len())
        && secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
