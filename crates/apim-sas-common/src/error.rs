//! Error types for registry loading and token signing.

use thiserror::Error;

/// Errors that can occur before any network call is made.
#[derive(Debug, Error)]
pub enum Error {
    /// The registry source is missing, malformed, or a record is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested instance name is not in the registry.
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// The HMAC primitive rejected its inputs.
    #[error("Signing error: {0}")]
    Signing(String),
}

/// Result type alias using the common `Error`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("invalid JSON: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid TOML: {err}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(format!("invalid YAML: {err}"))
    }
}
