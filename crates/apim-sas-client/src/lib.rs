//! # apim-sas-client
//!
//! Client for the API Management management API.
//!
//! Turns the signing keys held in an [`InstanceRegistry`](apim_sas_common::InstanceRegistry)
//! into the credentials an operator needs:
//! - A `SharedAccessSignature` header for direct management API calls
//! - A git password for cloning the instance configuration repository
//! - A one-time single-sign-on URL for the administrator portal
//!
//! ## Example
//!
//! ```no_run
//! use apim_sas_client::{ClientConfig, ManagementClient};
//! use apim_sas_common::{InstanceRecord, InstanceRegistry};
//!
//! # async fn example() -> Result<(), apim_sas_client::ClientError> {
//! let registry = InstanceRegistry::new([(
//!     "apim".to_string(),
//!     InstanceRecord::new("integration", "primary-key", "https://contoso.management.azure-api.net"),
//! )]);
//!
//! let client = ManagementClient::new(registry, ClientConfig::default())?;
//!
//! let header = client.management_token("apim")?;
//! let sso = client.admin_sso_link("apim").await?;
//! println!("{header}\n{sso}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;

pub use client::ManagementClient;
pub use config::{ClientConfig, EnableRetryConfig};
pub use error::{ClientError, Result};
