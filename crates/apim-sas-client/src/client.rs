//! Management API client.
//!
//! Every operation starts from a freshly signed management token for the
//! selected instance:
//!
//! - [`ManagementClient::management_token`] signs locally and never touches the network
//! - [`ManagementClient::scm_token`] exchanges the management token for a git
//!   credential, enabling git access first if needed
//! - [`ManagementClient::admin_sso_link`] exchanges it for a one-time admin URL
//!
//! # Git enable flow
//!
//! When the git endpoint is reported as disabled the client issues a single
//! `PATCH {"enabled": true}`, then re-fetches the state with bounded backoff
//! (see [`EnableRetryConfig`](crate::EnableRetryConfig)) until the change is
//! visible. This is the only request in the crate with a lasting remote
//! effect and it is logged at `info` level.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use apim_sas_client::{ClientConfig, ManagementClient};
//! use apim_sas_common::InstanceRegistry;
//!
//! # async fn example() -> Result<(), apim_sas_client::ClientError> {
//! let registry = InstanceRegistry::from_config_dir(Path::new("./config"))?;
//! let client = ManagementClient::new(registry, ClientConfig::default())?;
//!
//! println!("git clone {}", client.git_clone_url_for("apim").await?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use apim_sas_common::{InstanceRecord, InstanceRegistry, sign};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use secrecy::ExposeSecret;

use crate::api::{
    ADMIN_SSO_PATH, API_VERSION, EnableGitAccess, GIT_ACCESS_PATH, GIT_USERNAME, GitAccessState,
    SsoUrlResponse,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Client for the management API of the instances in a registry.
///
/// Holds no mutable state: each call signs its own token and performs its own
/// exchange, so a client can be cloned and shared freely.
#[derive(Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    registry: Arc<InstanceRegistry>,
    config: Arc<ClientConfig>,
}

// Keys live in the registry; only list instance names.
impl std::fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementClient")
            .field("instances", &self.registry.names().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ManagementClient {
    /// Creates a client over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the HTTP client cannot be built.
    pub fn new(registry: impl Into<Arc<InstanceRegistry>>, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            registry: registry.into(),
            config: Arc::new(config),
        })
    }

    /// The registry this client signs for.
    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Returns the `Authorization` header value for `instance`'s management API.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InstanceNotFound`] for an unknown instance.
    pub fn management_token(&self, instance: &str) -> Result<String> {
        self.management_token_at(instance, Utc::now())
    }

    /// Like [`Self::management_token`], anchored at `now` instead of the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InstanceNotFound`] for an unknown instance.
    pub fn management_token_at(&self, instance: &str, now: DateTime<Utc>) -> Result<String> {
        let record = self.registry.get(instance)?;
        Self::authorization(record, now)
    }

    /// Returns a URL-encoded git credential for `instance`.
    ///
    /// The value is meant as the password of a basic-auth clone URL, see
    /// [`Self::git_clone_url`]. Git access is enabled on the instance if it is
    /// not already.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InstanceNotFound`] for an unknown instance
    /// - [`ClientError::GitAccess`] if fetching the git state is refused
    /// - [`ClientError::Provisioning`] if the enable request is not answered with 204
    /// - [`ClientError::EnableNotReflected`] if the state never turns enabled
    /// - [`ClientError::Transport`] on network failure or timeout
    pub async fn scm_token(&self, instance: &str) -> Result<String> {
        let record = self.registry.get(instance)?;
        let url = endpoint(record, GIT_ACCESS_PATH);
        let retry = &self.config.enable_retry;
        let mut max_attempts = retry.max_attempts.max(1);
        let mut enable_sent = false;
        let mut attempt = 0;

        while attempt < max_attempts {
            attempt += 1;
            let authorization = Self::authorization(record, Utc::now())?;
            let state = self.fetch_git_access(&url, &authorization).await?;

            if state.enabled {
                return git_credential(state, Utc::now());
            }

            if !enable_sent {
                info!("Enabling git access for instance '{instance}'");
                self.enable_git_access(&url, &authorization).await?;
                info!("Git access enabled for instance '{instance}'");
                enable_sent = true;
                // At least one re-fetch follows the enable.
                max_attempts = max_attempts.max(attempt + 1);
            }

            if attempt < max_attempts {
                let delay = retry.delay_for(attempt);
                debug!(
                    "Git access for '{instance}' not yet reported as enabled, re-fetching in {delay:?} ({attempt}/{max_attempts})"
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!("Git access for '{instance}' still disabled after {max_attempts} attempts");
        Err(ClientError::EnableNotReflected {
            attempts: max_attempts,
        })
    }

    /// Generates a one-time SSO URL for the instance administrator.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InstanceNotFound`] for an unknown instance
    /// - [`ClientError::SsoGeneration`] if the API does not answer 200
    /// - [`ClientError::Transport`] on network failure or timeout
    pub async fn admin_sso_link(&self, instance: &str) -> Result<String> {
        let record = self.registry.get(instance)?;
        let url = endpoint(record, ADMIN_SSO_PATH);
        let authorization = Self::authorization(record, Utc::now())?;

        debug!("POST {url}");
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .body("")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            error!(
                "Could not create SSO URL for administrator (status {}): {body}",
                status.as_u16()
            );
            return Err(ClientError::SsoGeneration {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SsoUrlResponse = serde_json::from_str(&body)?;
        Ok(parsed.value)
    }

    /// Builds the clone URL for `instance` using `password` from [`Self::scm_token`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InstanceNotFound`] for an unknown instance, or
    /// [`ClientError::Config`] if the instance has no `scm` host configured.
    pub fn git_clone_url(&self, instance: &str, password: &str) -> Result<String> {
        let scm = scm_host(self.registry.get(instance)?, instance)?;
        Ok(format!("https://{GIT_USERNAME}:{password}@{scm}"))
    }

    /// Obtains a git credential for `instance` and returns the full clone URL.
    ///
    /// The `scm` host is checked before any request is made, so a registry
    /// without one never triggers the git enable flow.
    ///
    /// # Errors
    ///
    /// [`ClientError::Config`] if the instance has no `scm` host, otherwise
    /// the same errors as [`Self::scm_token`].
    pub async fn git_clone_url_for(&self, instance: &str) -> Result<String> {
        let scm = scm_host(self.registry.get(instance)?, instance)?;
        let password = self.scm_token(instance).await?;
        Ok(format!("https://{GIT_USERNAME}:{password}@{scm}"))
    }

    fn authorization(record: &InstanceRecord, now: DateTime<Utc>) -> Result<String> {
        let token = sign(record.identifier(), record.signing_key(), now)?;
        Ok(token.management_header())
    }

    async fn fetch_git_access(&self, url: &str, authorization: &str) -> Result<GitAccessState> {
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(
                "Git access request failed with status {}: {body}",
                status.as_u16()
            );
            return Err(ClientError::GitAccess {
                status: status.as_u16(),
                body,
            });
        }

        // Body carries the git primary key; log only the parsed flag.
        let state: GitAccessState = serde_json::from_str(&body)?;
        debug!("Git access enabled: {}", state.enabled);
        Ok(state)
    }

    async fn enable_git_access(&self, url: &str, authorization: &str) -> Result<()> {
        debug!("PATCH {url}");
        let response = self
            .http
            .patch(url)
            .header(AUTHORIZATION, authorization)
            .json(&EnableGitAccess { enabled: true })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_else(|e| {
            warn!("Failed to read error response body: {e}");
            String::new()
        });
        error!("Failed to enable git access (status {}): {body}", status.as_u16());
        Err(ClientError::Provisioning {
            status: status.as_u16(),
            body,
        })
    }
}

fn scm_host<'a>(record: &'a InstanceRecord, instance: &str) -> Result<&'a str> {
    record.scm_url().ok_or_else(|| {
        ClientError::Config(format!("instance '{instance}' has no 'scm' url configured"))
    })
}

fn endpoint(record: &InstanceRecord, path: &str) -> String {
    format!("{}{path}?{API_VERSION}", record.base_url())
}

/// Signs the git identity from an enabled state and URL-encodes the result.
fn git_credential(state: GitAccessState, now: DateTime<Utc>) -> Result<String> {
    let id = state.id.filter(|id| !id.is_empty()).ok_or_else(|| {
        ClientError::InvalidResponse("git access is enabled but no 'id' was returned".to_string())
    })?;
    let key = state.primary_key.ok_or_else(|| {
        ClientError::InvalidResponse(
            "git access is enabled but no 'primaryKey' was returned".to_string(),
        )
    })?;

    let token = sign(&id, key.expose_secret().as_bytes(), now)?;
    Ok(url::form_urlencoded::byte_serialize(token.header().as_bytes()).collect())
}
