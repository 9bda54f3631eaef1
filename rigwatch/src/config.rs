//! Host-supplied configuration.
//!
//! The host application constructs a [`Config`] and hands it to the
//! clients and coordinators once at startup. The bundled binaries build
//! one from `RIGWATCH_*` environment variables.

use std::env;

use strum::{Display, EnumString};
use thiserror::Error;

use crate::client::Credentials;

/// Currencies balances can be displayed in.
///
/// The API reports balances in BTC; the other entries are converted via
/// the exchange-rate table fetched alongside the account snapshot.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DisplayCurrency {
    #[default]
    Btc,
    Usd,
    Eur,
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// An optional variable is set to an unusable value.
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Everything the host supplies: API credentials, the display currency,
/// and which resource classes to poll.
#[derive(Clone, Debug)]
pub struct Config {
    pub organization_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub currency: DisplayCurrency,
    pub balances_enabled: bool,
    pub rigs_enabled: bool,
    pub devices_enabled: bool,
    pub payouts_enabled: bool,
}

impl Config {
    /// Create a configuration with every resource class enabled and
    /// balances displayed in BTC.
    pub fn new(
        organization_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            currency: DisplayCurrency::default(),
            balances_enabled: true,
            rigs_enabled: true,
            devices_enabled: true,
            payouts_enabled: true,
        }
    }

    /// Build a configuration from `RIGWATCH_*` environment variables.
    ///
    /// `RIGWATCH_ORG_ID`, `RIGWATCH_API_KEY`, and `RIGWATCH_API_SECRET`
    /// are required. `RIGWATCH_CURRENCY` selects the display currency;
    /// `RIGWATCH_BALANCES`, `RIGWATCH_RIGS`, `RIGWATCH_DEVICES`, and
    /// `RIGWATCH_PAYOUTS` accept `0`/`false` to disable a resource class.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(
            require_var("RIGWATCH_ORG_ID")?,
            require_var("RIGWATCH_API_KEY")?,
            require_var("RIGWATCH_API_SECRET")?,
        );

        if let Ok(value) = env::var("RIGWATCH_CURRENCY") {
            config.currency =
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: "RIGWATCH_CURRENCY",
                        value,
                    })?;
        }

        config.balances_enabled = flag_var("RIGWATCH_BALANCES");
        config.rigs_enabled = flag_var("RIGWATCH_RIGS");
        config.devices_enabled = flag_var("RIGWATCH_DEVICES");
        config.payouts_enabled = flag_var("RIGWATCH_PAYOUTS");

        Ok(config)
    }

    /// Credentials for the private API client.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.organization_id, &self.api_key, &self.api_secret)
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Boolean flag variable; unset means enabled.
fn flag_var(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => !matches!(value.as_str(), "0" | "false" | "no"),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_parses_case_insensitively() {
        assert_eq!("BTC".parse(), Ok(DisplayCurrency::Btc));
        assert_eq!("usd".parse(), Ok(DisplayCurrency::Usd));
        assert_eq!("Eur".parse(), Ok(DisplayCurrency::Eur));
        assert!("GBP".parse::<DisplayCurrency>().is_err());
    }

    #[test]
    fn currency_displays_upper() {
        assert_eq!(DisplayCurrency::Btc.to_string(), "BTC");
        assert_eq!(DisplayCurrency::Usd.to_string(), "USD");
    }

    #[test]
    fn new_enables_everything() {
        let config = Config::new("org", "key", "secret");
        assert!(config.balances_enabled);
        assert!(config.rigs_enabled);
        assert!(config.devices_enabled);
        assert!(config.payouts_enabled);
        assert_eq!(config.currency, DisplayCurrency::Btc);
    }
}
