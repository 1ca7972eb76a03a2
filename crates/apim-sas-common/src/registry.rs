//! Instance registry loading.
//!
//! The registry is a document mapping instance names to connection records.
//! It is usually kept as `instances.json` inside a configuration directory.
//!
//! ## Example Document
//!
//! ```json
//! {
//!   "apim": {
//!     "id": "integration",
//!     "key": "${APIM_PRIMARY_KEY}",
//!     "url": "https://contoso.management.azure-api.net/subscriptions/0000/resourceGroups/rg/providers/Microsoft.ApiManagement/service/contoso",
//!     "host": "contoso.azure-api.net",
//!     "scm": "contoso.scm.azure-api.net"
//!   }
//! }
//! ```
//!
//! TOML and YAML documents with the same shape are accepted too; see
//! [`InstanceRegistry::from_file`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::env;
use crate::error::{Error, Result};

/// Registry file name looked up inside a configuration directory.
pub const INSTANCES_FILE: &str = "instances.json";

/// Raw record shape as it appears in the document.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecord {
    id: String,
    key: SecretString,
    url: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    scm: Option<String>,
}

/// Connection details for one API Management instance.
///
/// Immutable once loaded. The signing key is held as a [`SecretString`] and is
/// redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    identifier: String,
    signing_key: SecretString,
    base_url: String,
    host: Option<String>,
    scm_url: Option<String>,
}

impl InstanceRecord {
    /// Creates a record, normalising `base_url` to a single trailing `/`.
    pub fn new(
        identifier: impl Into<String>,
        signing_key: impl Into<String>,
        base_url: impl AsRef<str>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            signing_key: SecretString::new(signing_key.into().into()),
            base_url: normalize_base_url(base_url.as_ref()),
            host: None,
            scm_url: None,
        }
    }

    /// Sets the gateway host name.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the source-control host used in clone URLs.
    #[must_use]
    pub fn with_scm_url(mut self, scm_url: impl Into<String>) -> Self {
        self.scm_url = Some(scm_url.into());
        self
    }

    /// The identifier tokens are issued for.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Raw key bytes fed to the HMAC.
    #[must_use]
    pub fn signing_key(&self) -> &[u8] {
        self.signing_key.expose_secret().as_bytes()
    }

    /// Management API base URL, always ending in exactly one `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Gateway host name, if configured.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Source-control host for clone URLs, if configured.
    #[must_use]
    pub fn scm_url(&self) -> Option<&str> {
        self.scm_url.as_deref()
    }

    fn from_raw(name: &str, raw: RawRecord) -> Result<Self> {
        if raw.id.trim().is_empty() {
            return Err(Error::Config(format!("instance '{name}' has an empty 'id'")));
        }
        if raw.key.expose_secret().is_empty() {
            return Err(Error::Config(format!("instance '{name}' has an empty 'key'")));
        }
        if raw.url.trim().is_empty() {
            return Err(Error::Config(format!("instance '{name}' has an empty 'url'")));
        }

        Ok(Self {
            identifier: raw.id,
            signing_key: raw.key,
            base_url: normalize_base_url(&raw.url),
            host: raw.host,
            scm_url: raw.scm,
        })
    }
}

/// Normalises a base URL so it ends with exactly one `/`.
#[must_use]
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// Immutable mapping from instance name to [`InstanceRecord`].
///
/// Built once and passed by reference; there is no global instance table.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: BTreeMap<String, InstanceRecord>,
}

impl InstanceRegistry {
    /// Builds a registry from already constructed records.
    pub fn new(instances: impl IntoIterator<Item = (String, InstanceRecord)>) -> Self {
        Self {
            instances: instances.into_iter().collect(),
        }
    }

    /// Builds a registry from a parsed document.
    ///
    /// Placeholders are resolved against the process environment before the
    /// records are validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not an object of records,
    /// a record is missing `id`, `key` or `url`, or a placeholder cannot be
    /// resolved.
    pub fn from_value(document: Value) -> Result<Self> {
        Self::from_resolved(env::resolve(document)?)
    }

    /// Like [`Self::from_value`], resolving placeholders with `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_value`].
    pub fn from_value_with(
        document: Value,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        Self::from_resolved(env::resolve_with(document, lookup)?)
    }

    fn from_resolved(document: Value) -> Result<Self> {
        let Value::Object(entries) = document else {
            return Err(Error::Config(
                "registry document must be an object mapping instance names to records"
                    .to_string(),
            ));
        };

        let mut instances = BTreeMap::new();
        for (name, entry) in entries {
            let raw: RawRecord = serde_json::from_value(entry)
                .map_err(|e| Error::Config(format!("invalid record for instance '{name}': {e}")))?;
            let record = InstanceRecord::from_raw(&name, raw)?;
            debug!("Loaded instance '{name}' ({})", record.base_url());
            instances.insert(name, record);
        }

        Ok(Self { instances })
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or invalid records.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(contents)?;
        Self::from_value(document)
    }

    /// Parses a TOML document where each instance is a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML or invalid records.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let document: Value = toml::from_str(contents)?;
        Self::from_value(document)
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed YAML or invalid records.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(contents)?;
        Self::from_value(document)
    }

    /// Loads a registry file, choosing the parser from its extension.
    ///
    /// `.json`, `.toml`, `.yaml` and `.yml` are supported.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file does not exist, cannot be read,
    /// has an unsupported extension, or fails to parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "Registry file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            Some("yaml" | "yml") => Self::from_yaml_str(&contents),
            _ => Err(Error::Config(format!(
                "Unsupported registry format '{}'. Use .json, .toml, .yaml or .yml",
                path.display()
            ))),
        }
    }

    /// Loads `instances.json` from a configuration directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the directory holds no `instances.json`
    /// or the file is invalid.
    pub fn from_config_dir(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join(INSTANCES_FILE))
    }

    /// Looks up an instance by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InstanceNotFound`] if no instance has that name.
    pub fn get(&self, name: &str) -> Result<&InstanceRecord> {
        self.instances
            .get(name)
            .ok_or_else(|| Error::InstanceNotFound(name.to_string()))
    }

    /// Instance names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn sample_json() -> &'static str {
        r#"
{
  "apim": {
    "id": "integration",
    "key": "c2VjcmV0",
    "url": "https://contoso.management.azure-api.net",
    "host": "contoso.azure-api.net",
    "scm": "contoso.scm.azure-api.net"
  },
  "staging": {
    "id": "integration",
    "key": "other",
    "url": "https://staging.management.azure-api.net/"
  }
}
        "#
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_registry() {
        let registry = InstanceRegistry::from_json_str(sample_json()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["apim", "staging"]);

        let apim = registry.get("apim").unwrap();
        assert_eq!(apim.identifier(), "integration");
        assert_eq!(apim.signing_key(), b"c2VjcmV0");
        assert_eq!(apim.host(), Some("contoso.azure-api.net"));
        assert_eq!(apim.scm_url(), Some("contoso.scm.azure-api.net"));

        let staging = registry.get("staging").unwrap();
        assert_eq!(staging.host(), None);
        assert_eq!(staging.scm_url(), None);
    }

    #[test]
    fn test_base_url_normalization() {
        let registry = InstanceRegistry::from_json_str(sample_json()).unwrap();
        assert_eq!(
            registry.get("apim").unwrap().base_url(),
            "https://contoso.management.azure-api.net/"
        );
        assert_eq!(
            registry.get("staging").unwrap().base_url(),
            "https://staging.management.azure-api.net/"
        );

        assert_eq!(normalize_base_url("https://x"), normalize_base_url("https://x/"));
        assert_eq!(normalize_base_url("https://x//"), "https://x/");
    }

    #[test]
    fn test_unknown_instance() {
        let registry = InstanceRegistry::from_json_str(sample_json()).unwrap();
        let err = registry.get("production").unwrap_err();
        assert!(matches!(err, Error::InstanceNotFound(name) if name == "production"));
    }

    #[test]
    fn test_missing_required_field() {
        for field in ["id", "key", "url"] {
            let mut record = json!({ "id": "i", "key": "k", "url": "https://x" });
            record.as_object_mut().unwrap().remove(field);

            let err = InstanceRegistry::from_value_with(json!({ "apim": record }), &no_env)
                .unwrap_err();
            assert!(
                matches!(&err, Error::Config(msg) if msg.contains(field)),
                "expected config error mentioning {field}, got {err}"
            );
        }
    }

    #[test]
    fn test_empty_key_rejected() {
        let doc = json!({ "apim": { "id": "i", "key": "", "url": "https://x" } });
        assert!(matches!(
            InstanceRegistry::from_value_with(doc, &no_env),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let doc = json!({ "apim": { "id": "i", "key": "k", "url": "https://x", "scn": "typo" } });
        assert!(matches!(
            InstanceRegistry::from_value_with(doc, &no_env),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            InstanceRegistry::from_json_str("{ not json"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            InstanceRegistry::from_json_str("[1, 2, 3]"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_placeholders_resolved_at_load() {
        let doc = json!({
            "apim": { "id": "${APIM_ID}", "key": "$APIM_KEY", "url": "https://x" }
        });
        let lookup = |name: &str| match name {
            "APIM_ID" => Some("integration".to_string()),
            "APIM_KEY" => Some("from-env".to_string()),
            _ => None,
        };

        let registry = InstanceRegistry::from_value_with(doc, &lookup).unwrap();
        let record = registry.get("apim").unwrap();
        assert_eq!(record.identifier(), "integration");
        assert_eq!(record.signing_key(), b"from-env");
    }

    #[test]
    fn test_unresolved_placeholder_fails() {
        let doc = json!({ "apim": { "id": "i", "key": "${MISSING_KEY}", "url": "https://x" } });
        let err = InstanceRegistry::from_value_with(doc, &no_env).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("MISSING_KEY")));
    }

    #[test]
    fn test_toml_and_yaml_documents() {
        let toml = r#"
[apim]
id = "integration"
key = "k"
url = "https://contoso.management.azure-api.net"
scm = "contoso.scm.azure-api.net"
        "#;
        let yaml = r"
apim:
  id: integration
  key: k
  url: https://contoso.management.azure-api.net
  scm: contoso.scm.azure-api.net
        ";

        for registry in [
            InstanceRegistry::from_toml_str(toml).unwrap(),
            InstanceRegistry::from_yaml_str(yaml).unwrap(),
        ] {
            let record = registry.get("apim").unwrap();
            assert_eq!(record.base_url(), "https://contoso.management.azure-api.net/");
            assert_eq!(record.scm_url(), Some("contoso.scm.azure-api.net"));
        }
    }

    #[test]
    fn test_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();

        let err = InstanceRegistry::from_config_dir(dir.path()).unwrap_err();
        let Error::Config(msg) = err else {
            panic!("expected config error");
        };
        assert!(msg.starts_with("Registry file not found"));
        assert!(msg.contains(INSTANCES_FILE));
        assert_eq!(msg.matches("not found").count(), 1);

        let mut file = fs::File::create(dir.path().join(INSTANCES_FILE)).unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let registry = InstanceRegistry::from_config_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.ini");
        fs::write(&path, "apim=1").unwrap();

        let err = InstanceRegistry::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Unsupported")));
    }

    #[test]
    fn test_debug_redacts_key() {
        let record = InstanceRecord::new("integration", "super-secret-key", "https://x");
        let debug = format!("{record:?}");
        assert!(!debug.contains("super-secret-key"));
        assert_eq!(record.base_url(), "https://x/");
    }
}
