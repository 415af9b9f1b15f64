//! Identity-provider webhook signature verification (svix scheme).
//!
//! The provider signs `"{svix-id}.{svix-timestamp}.{body}"` with HMAC-SHA256
//! using the base64 key carried in a `whsec_` secret, and sends one or more
//! space-separated `v1,<base64 digest>` entries in `svix-signature`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between the signed timestamp and now.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid webhook secret")]
    InvalidSecret,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Timestamp outside tolerance")]
    TimestampOutOfRange,

    #[error("No matching signature")]
    Mismatch,
}

/// The three svix headers, as received.
#[derive(Debug, Clone, Copy)]
pub struct SignedHeaders<'a> {
    pub id: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

/// Verifies webhook payloads against a configured secret.
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    /// Build from a `whsec_<base64>` secret. A secret without the prefix is
    /// decoded as plain base64.
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SignatureError::InvalidSecret)?;
        if key.is_empty() {
            return Err(SignatureError::InvalidSecret);
        }
        Ok(Self { key })
    }

    pub fn verify(
        &self,
        headers: SignedHeaders<'_>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let id = headers.id.ok_or(SignatureError::MissingHeader("svix-id"))?;
        let ts = headers
            .timestamp
            .ok_or(SignatureError::MissingHeader("svix-timestamp"))?;
        let sigs = headers
            .signature
            .ok_or(SignatureError::MissingHeader("svix-signature"))?;

        let ts_secs: i64 = ts.trim().parse().map_err(|_| SignatureError::InvalidTimestamp)?;
        if (now.timestamp() - ts_secs).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(SignatureError::TimestampOutOfRange);
        }

        let matched = sigs
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix("v1,"))
            .filter_map(|b64| STANDARD.decode(b64).ok())
            .any(|provided| {
                let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
                    return false;
                };
                mac.update(id.as_bytes());
                mac.update(b".");
                mac.update(ts.as_bytes());
                mac.update(b".");
                mac.update(body);
                // Constant-time comparison
                mac.verify_slice(&provided).is_ok()
            });

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Produce a `v1,<base64>` signature entry. Used by tests and tooling.
    pub fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(format!("{id}.{timestamp}.").as_bytes());
        mac.update(body);
        Ok(format!("v1,{}", STANDARD.encode(mac.finalize().into_bytes())))
    }
}
