//! Shared Access Signature construction.
//!
//! A token is a pure function of an identifier, a key and the current time:
//!
//! ```text
//! expiry    = now + 1h, formatted as YYYY-MM-DDTHH:MM:SS.0000000Z
//! signature = base64(HMAC-SHA512(key, identifier + "\n" + expiry))
//! header    = uid=<identifier>&ex=<expiry>&sn=<signature>
//! ```
//!
//! The remote verifier recomputes the signature from the same fields, so the
//! expiry format and the message layout must match byte for byte. Expiry is
//! never checked locally.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

/// Scheme prefix for management API `Authorization` headers.
pub const SHARED_ACCESS_SIGNATURE: &str = "SharedAccessSignature";

/// Validity window of every token, anchored at signing time.
pub const TOKEN_LIFETIME: TimeDelta = TimeDelta::hours(1);

/// Seven fractional digits are always zero; the verifier expects them literally.
const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.0000000Z";

/// A signed access token.
///
/// Regenerated for every request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    identifier: String,
    expires_at: DateTime<Utc>,
    signature: String,
    header: String,
}

impl SignedToken {
    /// The identifier the token was issued for.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Instant the remote server stops accepting the token.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Base64 encoded HMAC-SHA512 signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The `uid=..&ex=..&sn=..` string.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// The full `Authorization` header value for the management API.
    #[must_use]
    pub fn management_header(&self) -> String {
        format!("{SHARED_ACCESS_SIGNATURE} {}", self.header)
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)
    }
}

/// Formats an expiry instant the way the verifier parses it.
#[must_use]
pub fn format_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.format(EXPIRY_FORMAT).to_string()
}

/// Signs `identifier` with `key`, producing a token valid for one hour from `now`.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the identifier or key is empty, or if the
/// HMAC primitive rejects the key.
pub fn sign(identifier: &str, key: &[u8], now: DateTime<Utc>) -> Result<SignedToken> {
    if identifier.is_empty() {
        return Err(Error::Signing("identifier must not be empty".to_string()));
    }
    if key.is_empty() {
        return Err(Error::Signing("key must not be empty".to_string()));
    }

    let expires_at = now + TOKEN_LIFETIME;
    let expiry = format_expiry(expires_at);

    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(identifier.as_bytes());
    mac.update(b"\n");
    mac.update(expiry.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let header = format!("uid={identifier}&ex={expiry}&sn={signature}");

    Ok(SignedToken {
        identifier: identifier.to_string(),
        expires_at,
        signature,
        header,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign("integration", b"secret", fixed_now()).unwrap();
        let b = sign("integration", b"secret", fixed_now()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.header(), b.header());
    }

    #[test]
    fn test_expiry_is_one_hour_with_seven_fraction_digits() {
        let token = sign("integration", b"secret", fixed_now()).unwrap();

        assert_eq!(token.expires_at(), fixed_now() + TimeDelta::hours(1));
        assert!(
            token
                .header()
                .starts_with("uid=integration&ex=2017-03-14T10:26:53.0000000Z&sn=")
        );
    }

    #[test]
    fn test_expiry_drops_subsecond_precision() {
        let now = fixed_now() + TimeDelta::milliseconds(987);
        assert_eq!(format_expiry(now), "2017-03-14T09:26:53.0000000Z");
    }

    #[test]
    fn test_expiry_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2020, 12, 31, 23, 30, 0).unwrap();
        let token = sign("id", b"k", now).unwrap();
        assert!(token.header().contains("&ex=2021-01-01T00:30:00.0000000Z&"));
    }

    #[test]
    fn test_signature_matches_manual_hmac() {
        let token = sign("integration", b"secret", fixed_now()).unwrap();

        let mut mac = HmacSha512::new_from_slice(b"secret").unwrap();
        mac.update(b"integration\n2017-03-14T10:26:53.0000000Z");
        let expected = STANDARD.encode(mac.finalize().into_bytes());

        assert_eq!(token.signature(), expected);
        assert!(token.header().ends_with(&format!("&sn={expected}")));
        // 64 byte digest encodes to 88 base64 characters
        assert_eq!(token.signature().len(), 88);
    }

    #[test]
    fn test_different_keys_produce_different_signatures() {
        let a = sign("integration", b"one", fixed_now()).unwrap();
        let b = sign("integration", b"two", fixed_now()).unwrap();
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_management_header_and_display() {
        let token = sign("ID1", b"K1", fixed_now()).unwrap();
        assert_eq!(token.to_string(), token.header());
        assert!(
            token
                .management_header()
                .starts_with("SharedAccessSignature uid=ID1&ex=")
        );
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        assert!(matches!(
            sign("", b"key", fixed_now()),
            Err(Error::Signing(_))
        ));
        assert!(matches!(
            sign("id", b"", fixed_now()),
            Err(Error::Signing(_))
        ));
    }
}
