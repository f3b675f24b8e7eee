//! Provider options.
//!
//! Options are fixed when a provider is compiled. They can be set in code,
//! read from environment variables, or (with the `config` feature)
//! deserialized from whatever format the host application loads.

use std::env;

#[cfg(feature = "config")]
use serde::Deserialize;

/// Behavior switches for a compiled provider.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::ProviderOptions;
///
/// let options = ProviderOptions::new()
///     .validate_scopes(true)
///     .validate_on_build(true);
///
/// assert!(options.validate_scopes);
/// assert!(options.validate_on_build);
/// assert_eq!(ProviderOptions::default(), ProviderOptions::new());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ProviderOptions {
    /// Reject resolving scoped services from the root provider, including
    /// scoped dependencies captured by singletons.
    pub validate_scopes: bool,
    /// Compile every registration when the provider is built and report all
    /// broken ones at once.
    pub validate_on_build: bool,
}

impl ProviderOptions {
    pub const ENV_VALIDATE_SCOPES: &'static str = "FERROUS_IOC_VALIDATE_SCOPES";
    pub const ENV_VALIDATE_ON_BUILD: &'static str = "FERROUS_IOC_VALIDATE_ON_BUILD";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    /// Options read from `FERROUS_IOC_VALIDATE_SCOPES` and
    /// `FERROUS_IOC_VALIDATE_ON_BUILD`.
    ///
    /// `1`, `true`, `yes` and `on` (any case) enable a switch; anything else,
    /// or an unset variable, leaves it off.
    pub fn from_env() -> Self {
        Self {
            validate_scopes: env_flag(Self::ENV_VALIDATE_SCOPES),
            validate_on_build: env_flag(Self::ENV_VALIDATE_ON_BUILD),
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|value| parse_flag(&value)).unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
