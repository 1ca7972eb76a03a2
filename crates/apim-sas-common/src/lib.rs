//! # apim-sas-common
//!
//! Instance registry and Shared Access Signature signing for API Management instances.
//!
//! This crate provides the network-free half of the toolkit:
//! - Loading a registry of named instances from JSON, TOML or YAML
//! - Resolving `${VAR}` placeholders against the process environment at load time
//! - Computing the HMAC-SHA512 signed tokens the management API expects
//!
//! ## Example
//!
//! ```
//! use apim_sas_common::{InstanceRegistry, sign};
//! use chrono::{TimeZone, Utc};
//!
//! let registry = InstanceRegistry::from_json_str(
//!     r#"{ "apim": { "id": "integration", "key": "secret", "url": "https://contoso.management.azure-api.net" } }"#,
//! )?;
//!
//! let record = registry.get("apim")?;
//! assert_eq!(record.base_url(), "https://contoso.management.azure-api.net/");
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
//! let token = sign(record.identifier(), record.signing_key(), now)?;
//! assert!(token.header().starts_with("uid=integration&ex=2024-01-01T13:00:00.0000000Z&sn="));
//! # Ok::<(), apim_sas_common::Error>(())
//! ```

/// Environment placeholder resolution for configuration values.
pub mod env;
pub mod error;
/// Named instance records and the registry that holds them.
///
/// Handles document parsing, placeholder resolution and base URL normalisation.
pub mod registry;
/// Shared Access Signature construction.
pub mod signature;

pub use error::{Error, Result};
pub use registry::{INSTANCES_FILE, InstanceRecord, InstanceRegistry};
pub use signature::{SHARED_ACCESS_SIGNATURE, SignedToken, TOKEN_LIFETIME, sign};
