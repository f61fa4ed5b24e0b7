//! Stripe webhook signature verification
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The
//! signed payload is `<t>.<raw body>`, keyed with the endpoint's signing
//! secret. Verification must run on the exact bytes received; any
//! re-serialisation of the body breaks it.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::stripe::error::{StripeWebhookError, StripeWebhookResult};

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

const SCHEME_V1: &str = "v1";

/// `v1` entries checked per request; later ones are ignored
pub const MAX_SIGNATURE_CANDIDATES: usize = 8;

/// Parsed `Stripe-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signed timestamp (Unix seconds)
    pub timestamp: i64,
    /// Candidate `v1` signatures, still hex-encoded
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parse a raw header value
    pub fn parse(header: &str) -> StripeWebhookResult<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        StripeWebhookError::InvalidSignatureHeader(format!(
                            "bad timestamp {value:?}"
                        ))
                    })?);
                }
                SCHEME_V1 => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            StripeWebhookError::InvalidSignatureHeader("missing timestamp".to_string())
        })?;
        if signatures.is_empty() {
            return Err(StripeWebhookError::InvalidSignatureHeader(
                "no v1 signatures".to_string(),
            ));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies `Stripe-Signature` headers against a shared signing secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl SignatureVerifier {
    /// Create a verifier for the given signing secret
    pub fn new(secret: impl AsRef<[u8]>, tolerance: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance,
        }
    }

    /// Verify `payload` against a raw header value at time `now`
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> StripeWebhookResult<()> {
        let header = header
            .filter(|h| !h.trim().is_empty())
            .ok_or(StripeWebhookError::MissingSignature)?;
        let parsed = SignatureHeader::parse(header)?;

        let mac = self.mac(parsed.timestamp, payload);
        let matched = parsed
            .signatures
            .iter()
            .take(MAX_SIGNATURE_CANDIDATES)
            .any(|candidate| Self::matches(&mac, candidate));
        if !matched {
            return Err(StripeWebhookError::SignatureMismatch);
        }

        let age_secs = now.timestamp() - parsed.timestamp;
        let tolerance_secs = self.tolerance.num_seconds();
        if tolerance_secs > 0 && age_secs.abs() > tolerance_secs {
            return Err(StripeWebhookError::TimestampOutOfTolerance {
                age_secs,
                tolerance_secs,
            });
        }

        Ok(())
    }

    /// Compute the hex `v1` signature for a payload (used by tests and tooling)
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> String {
        hex::encode(self.mac(timestamp, payload).finalize().into_bytes())
    }

    /// Build a complete header value for a payload
    pub fn header_for(&self, timestamp: i64, payload: &[u8]) -> String {
        format!("t={},{}={}", timestamp, SCHEME_V1, self.sign(timestamp, payload))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .expect("HMAC accepts any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }

    fn matches(mac: &HmacSha256, candidate: &str) -> bool {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        // verify_slice compares in constant time
        mac.clone().verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = b"{\"type\":\"checkout.session.completed\"}";

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET, Duration::seconds(300))
    }

    #[test]
    fn test_valid_signature() {
        let v = verifier();
        let header = v.header_for(now().timestamp(), PAYLOAD);
        assert!(v.verify(PAYLOAD, Some(&header), now()).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = SignatureVerifier::new("wrong_secret", Duration::seconds(300))
            .header_for(now().timestamp(), PAYLOAD);
        assert!(matches!(
            verifier().verify(PAYLOAD, Some(&header), now()),
            Err(StripeWebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let v = verifier();
        let header = v.header_for(now().timestamp(), PAYLOAD);
        let tampered = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
        assert!(v.verify(tampered, Some(&header), now()).is_err());
    }

    #[test]
    fn test_any_v1_may_match() {
        let v = verifier();
        let good = v.sign(now().timestamp(), PAYLOAD);
        let header = format!("t={},v1={},v1={},v0=ignored", now().timestamp(), "ab".repeat(32), good);
        assert!(v.verify(PAYLOAD, Some(&header), now()).is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let v = verifier();
        let stale = now().timestamp() - 600;
        let header = v.header_for(stale, PAYLOAD);
        assert!(matches!(
            v.verify(PAYLOAD, Some(&header), now()),
            Err(StripeWebhookError::TimestampOutOfTolerance { age_secs: 600, .. })
        ));
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        let v = verifier();
        assert!(matches!(
            v.verify(PAYLOAD, None, now()),
            Err(StripeWebhookError::MissingSignature)
        ));
        assert!(matches!(
            v.verify(PAYLOAD, Some(""), now()),
            Err(StripeWebhookError::MissingSignature)
        ));
        assert!(matches!(
            v.verify(PAYLOAD, Some("garbage"), now()),
            Err(StripeWebhookError::InvalidSignatureHeader(_))
        ));
        assert!(matches!(
            v.verify(PAYLOAD, Some("t=1234567890"), now()),
            Err(StripeWebhookError::InvalidSignatureHeader(_))
        ));
        assert!(matches!(
            v.verify(PAYLOAD, Some("v1=somesignature"), now()),
            Err(StripeWebhookError::InvalidSignatureHeader(_))
        ));
    }

    #[test]
    fn test_non_hex_signature_is_mismatch() {
        let header = format!("t={},v1=not-hex-zz", now().timestamp());
        assert!(matches!(
            verifier().verify(PAYLOAD, Some(&header), now()),
            Err(StripeWebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_candidates_past_the_cap_are_ignored() {
        let v = verifier();
        let good = v.sign(now().timestamp(), PAYLOAD);
        let filler = ",v1=00".repeat(MAX_SIGNATURE_CANDIDATES);
        let header = format!("t={}{},v1={}", now().timestamp(), filler, good);
        assert!(matches!(
            v.verify(PAYLOAD, Some(&header), now()),
            Err(StripeWebhookError::SignatureMismatch)
        ));

        let filler = ",v1=00".repeat(MAX_SIGNATURE_CANDIDATES - 1);
        let header = format!("t={}{},v1={}", now().timestamp(), filler, good);
        assert!(v.verify(PAYLOAD, Some(&header), now()).is_ok());
    }

    #[test]
    fn test_many_candidates_cost_about_one_mac() {
        let v = verifier();
        let body = vec![b'x'; 1 << 20];
        let ts = now().timestamp();

        let single = format!("t={ts},v1=");
        let start = std::time::Instant::now();
        assert!(v.verify(&body, Some(&single), now()).is_err());
        let one = start.elapsed();

        let many = format!("t={ts}{}", ",v1=".repeat(2000));
        let start = std::time::Instant::now();
        assert!(v.verify(&body, Some(&many), now()).is_err());
        let flood = start.elapsed();

        assert!(
            flood < one * 10 + std::time::Duration::from_millis(50),
            "one={one:?} flood={flood:?}"
        );
    }

    #[test]
    fn test_header_parse() {
        let parsed = SignatureHeader::parse("t=12, v1=aa ,v1=bb").unwrap();
        assert_eq!(parsed.timestamp, 12);
        assert_eq!(parsed.signatures, vec!["aa".to_string(), "bb".to_string()]);
    }
}
