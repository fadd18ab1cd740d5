//! Environment configuration

use std::str::FromStr;
use std::time::Duration;

use farmbot_core::constants::{
    DEFAULT_LOOP_INTERVAL_MS, DEFAULT_MQTT_PORT, DEFAULT_RPC_TIMEOUT_MS, DEFAULT_SERVER,
};
use farmbot_types::Credentials;

use crate::app::FailurePolicy;
use crate::error::{Error, Result};

pub const ENV_EMAIL: &str = "FARMBOT_EMAIL";
pub const ENV_PASSWORD: &str = "FARMBOT_PASSWORD";
pub const ENV_SERVER: &str = "FARMBOT_SERVER";
pub const ENV_INTERVAL_MS: &str = "FARMBOT_INTERVAL_MS";
pub const ENV_MQTT_PORT: &str = "FARMBOT_MQTT_PORT";
pub const ENV_RPC_TIMEOUT_MS: &str = "FARMBOT_RPC_TIMEOUT_MS";
pub const ENV_HALT_ON_FAILURE: &str = "FARMBOT_HALT_ON_FAILURE";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,

    /// Web app base URL
    pub server: String,

    /// Motion loop period
    pub interval: Duration,

    pub mqtt_port: u16,

    /// How long a command may wait for its reply
    pub rpc_timeout: Duration,

    pub failure_policy: FailurePolicy,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup
    ///
    /// Empty credentials count as unset, but any other value is taken as is.
    /// Blank optional settings fall back to their defaults. Missing
    /// credentials fail before anything else is looked at.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let get = |key: &str| set(key).filter(|value| !value.trim().is_empty());

        let email = set(ENV_EMAIL);
        let password = set(ENV_PASSWORD);

        let credentials = match (email, password) {
            (Some(email), Some(password)) => Credentials::new(email, password)?,
            (None, Some(_)) => return Err(Error::MissingCredentials(ENV_EMAIL.into())),
            (Some(_), None) => return Err(Error::MissingCredentials(ENV_PASSWORD.into())),
            (None, None) => {
                return Err(Error::MissingCredentials(format!(
                    "{} or {}",
                    ENV_EMAIL, ENV_PASSWORD
                )));
            }
        };

        let server = get(ENV_SERVER).unwrap_or_else(|| DEFAULT_SERVER.to_string());
        if !server.starts_with("http://") && !server.starts_with("https://") {
            return Err(Error::InvalidConfig {
                key: ENV_SERVER,
                reason: format!("'{}' is not an http(s) URL", server),
            });
        }

        let interval = parse_or(&get, ENV_INTERVAL_MS, DEFAULT_LOOP_INTERVAL_MS)?;
        if interval == 0 {
            return Err(Error::InvalidConfig {
                key: ENV_INTERVAL_MS,
                reason: "must be greater than zero".into(),
            });
        }

        let failure_policy = match get(ENV_HALT_ON_FAILURE) {
            None => FailurePolicy::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => FailurePolicy::Halt,
                "0" | "false" | "no" | "off" => FailurePolicy::Reset,
                other => {
                    return Err(Error::InvalidConfig {
                        key: ENV_HALT_ON_FAILURE,
                        reason: format!("'{}' is not a boolean", other),
                    });
                }
            },
        };

        Ok(Self {
            credentials,
            server,
            interval: Duration::from_millis(interval),
            mqtt_port: parse_or(&get, ENV_MQTT_PORT, DEFAULT_MQTT_PORT)?,
            rpc_timeout: Duration::from_millis(parse_or(
                &get,
                ENV_RPC_TIMEOUT_MS,
                DEFAULT_RPC_TIMEOUT_MS,
            )?),
            failure_policy,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
            key,
            reason: format!("'{}': {}", raw, e),
        }),
    }
}
