//! Management API wire types and endpoint paths.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Query string appended to every management API request.
pub const API_VERSION: &str = "api-version=2015-09-15";

/// Git access configuration endpoint, relative to the instance base URL.
pub const GIT_ACCESS_PATH: &str = "tenant/access/git";

/// Administrator SSO URL endpoint, relative to the instance base URL.
pub const ADMIN_SSO_PATH: &str = "users/1/generateSsoUrl";

/// User name the source-control endpoint expects in clone URLs.
pub const GIT_USERNAME: &str = "apim";

/// Git access state for an instance, as returned by the API.
///
/// Fetched on demand and never cached.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitAccessState {
    /// Whether the git endpoint is provisioned.
    pub enabled: bool,
    /// Identifier to sign git credentials with.
    #[serde(default)]
    pub id: Option<String>,
    /// Key to sign git credentials with.
    #[serde(default)]
    pub primary_key: Option<SecretString>,
}

/// Body of the PATCH that enables git access.
#[derive(Debug, Serialize)]
pub struct EnableGitAccess {
    pub enabled: bool,
}

/// Response of the SSO URL endpoint.
#[derive(Debug, Deserialize)]
pub struct SsoUrlResponse {
    pub value: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_git_access_state_tolerates_extra_fields() {
        let state: GitAccessState = serde_json::from_str(
            r#"{"id":"git","primaryKey":"pk","secondaryKey":"sk","enabled":true}"#,
        )
        .unwrap();

        assert!(state.enabled);
        assert_eq!(state.id.as_deref(), Some("git"));
        assert_eq!(state.primary_key.unwrap().expose_secret(), "pk");
    }

    #[test]
    fn test_git_access_state_disabled_without_keys() {
        let state: GitAccessState = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        assert!(!state.enabled);
        assert!(state.id.is_none());
        assert!(state.primary_key.is_none());
    }

    #[test]
    fn test_enable_body() {
        let body = serde_json::to_value(EnableGitAccess { enabled: true }).unwrap();
        assert_eq!(body, serde_json::json!({ "enabled": true }));
    }
}
