//! Error types for the management API client.

use thiserror::Error;

/// Errors that can occur when deriving credentials from an instance.
///
/// Configuration and lookup failures surface before any request is sent.
/// Remote failures carry the HTTP status and response body for diagnosis.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Registry or client configuration issue.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested instance is not in the registry.
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Token signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Network or HTTP failure, including timeouts.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON decoding error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The API answered with data that does not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Fetching the git access state returned a non-success status.
    #[error("Git access request failed with status {status}: {body}")]
    GitAccess {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Enabling git access did not return 204 No Content.
    #[error("Failed to enable git access (status {status}): {body}")]
    Provisioning {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Git access was enabled but the API kept reporting it as disabled.
    #[error("Git access still reported as disabled after {attempts} attempts")]
    EnableNotReflected {
        /// Number of state fetches made.
        attempts: u32,
    },

    /// The administrator SSO URL endpoint did not return 200.
    #[error("Could not create SSO URL for administrator (status {status}): {body}")]
    SsoGeneration {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Result type alias using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<apim_sas_common::Error> for ClientError {
    fn from(err: apim_sas_common::Error) -> Self {
        match err {
            apim_sas_common::Error::Config(msg) => Self::Config(msg),
            apim_sas_common::Error::InstanceNotFound(name) => Self::InstanceNotFound(name),
            apim_sas_common::Error::Signing(msg) => Self::Signing(msg),
        }
    }
}

impl ClientError {
    /// Check if the instance name was unknown.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::InstanceNotFound(_))
    }

    /// Check if this is a network-level failure.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if enabling git access failed in either form.
    pub const fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::Provisioning { .. } | Self::EnableNotReflected { .. }
        )
    }

    /// HTTP status returned by the API, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::GitAccess { status, .. }
            | Self::Provisioning { status, .. }
            | Self::SsoGeneration { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
