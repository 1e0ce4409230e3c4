use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::exchange::bitfinex::{BITFINEX_API_URL, BITFINEX_WS_URL};

/// Environment variable holding the Bitfinex API key
pub const KEY_VAR: &str = "bitfinex_key";
/// Environment variable holding the Bitfinex API secret
pub const SECRET_VAR: &str = "bitfinex_secret";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Missing {0}")]
    MissingCredential(&'static str),

    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeSettings {
    pub ws_url: String,
    pub api_url: String,
    pub request_timeout_secs: u64,
}

impl ExchangeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformSettings {
    /// Symbols subscribed at startup
    pub warm_symbols: Vec<String>,
    pub quote_buffer: usize,
    pub tick_buffer: usize,
    pub tick_size: f64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            warm_symbols: vec!["BTCUSD".to_string(), "LTCUSD".to_string()],
            quote_buffer: 1,
            tick_buffer: 16,
            tick_size: 0.01,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub exchange: ExchangeSettings,
    pub platform: PlatformSettings,
}

impl Settings {
    pub fn new() -> Result<Self, SettingsError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::load(&run_mode)
    }

    /// Defaults, then `config/default`, then `config/{run_mode}`, then
    /// `BFX_`-prefixed environment variables
    pub fn load(run_mode: &str) -> Result<Self, SettingsError> {
        let builder = Config::builder()
            .set_default("exchange.ws_url", BITFINEX_WS_URL)?
            .set_default("exchange.api_url", BITFINEX_API_URL)?
            .set_default("exchange.request_timeout_secs", 30_i64)?
            .set_default("platform.warm_symbols", vec!["BTCUSD", "LTCUSD"])?
            .set_default("platform.quote_buffer", 1_i64)?
            .set_default("platform.tick_buffer", 16_i64)?
            .set_default("platform.tick_size", 0.01_f64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("BFX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("platform.warm_symbols"),
            );

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

/// Exchange API key pair
#[derive(Clone)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    /// Read `bitfinex_key` / `bitfinex_secret` from the environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(SettingsError::MissingCredential(name))
        };

        Ok(Self {
            key: read(KEY_VAR)?,
            secret: read(SECRET_VAR)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load("no-such-mode").unwrap();
        assert_eq!(settings.platform.tick_size, 0.01);
        assert_eq!(settings.exchange.request_timeout(), Duration::from_secs(30));
        assert!(settings.exchange.ws_url.starts_with("wss://"));
    }

    #[test]
    fn test_platform_defaults_match_warm_set() {
        let defaults = PlatformSettings::default();
        assert_eq!(defaults.warm_symbols, vec!["BTCUSD", "LTCUSD"]);
        assert_eq!(defaults.quote_buffer, 1);
    }

    #[test]
    fn test_credentials_present() {
        let creds = Credentials::from_lookup(lookup(&[
            ("bitfinex_key", "abc"),
            ("bitfinex_secret", "xyz"),
        ]))
        .unwrap();
        assert_eq!(creds.key, "abc");
        assert_eq!(creds.secret, "xyz");
        assert!(!format!("{:?}", creds).contains("xyz"));
    }

    #[test]
    fn test_missing_key_is_reported_first() {
        let err = Credentials::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::MissingCredential("bitfinex_key")));
        assert_eq!(err.to_string(), "Missing bitfinex_key");
    }

    #[test]
    fn test_missing_or_empty_secret() {
        let err = Credentials::from_lookup(lookup(&[("bitfinex_key", "abc")])).unwrap_err();
        assert!(matches!(err, SettingsError::MissingCredential("bitfinex_secret")));

        let err = Credentials::from_lookup(lookup(&[
            ("bitfinex_key", "abc"),
            ("bitfinex_secret", ""),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::MissingCredential("bitfinex_secret")));
    }
}
