//! Outbound webhook wire contract: body shape, signing, transport, and
//! the retry backoff schedule.
//!
//! The signed byte sequence is the exact JSON request body; the signature
//! travels in `X-Webhook-Signature` as lowercase hex HMAC-SHA256 keyed by
//! the merchant's webhook secret. This contract is stable; merchant
//! integrations verify against it.

use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Request body sent to the merchant endpoint. Field order is the
/// serialization order; the signature covers these exact bytes.
#[derive(Debug, Serialize)]
pub struct WebhookBody<'a> {
    pub event_type: &'a str,
    pub merchant_id: Uuid,
    pub payload: &'a Value,
    pub timestamp: DateTime<Utc>,
}

impl<'a> WebhookBody<'a> {
    pub fn render(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Lowercase hex HMAC-SHA256 over the exact body bytes.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Delay before the n-th retry (`attempts_made` failures so far):
/// `base * 2^(attempts_made - 1)`, capped.
pub fn retry_delay(attempts_made: u32, base: Duration, cap: Duration) -> Duration {
    if attempts_made == 0 {
        return base.min(cap);
    }
    let exponent = (attempts_made - 1).min(32);
    let secs = base.as_secs().saturating_mul(1u64 << exponent);
    Duration::from_secs(secs).min(cap)
}

/// Outcome of a single delivery attempt. Anything that is not a 2xx
/// response, including timeouts and connection failures, is retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Failed { reason: String },
}

/// Transport seam for the delivery engine; tests substitute scripted
/// implementations.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn deliver(&self, url: &str, body: &str, signature: &str) -> DeliveryOutcome;
}

/// reqwest-backed sender with an explicit request timeout so a hung
/// merchant endpoint cannot stall the delivery engine.
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn deliver(&self, url: &str, body: &str, signature: &str) -> DeliveryOutcome {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body.to_string())
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    DeliveryOutcome::Delivered {
                        status: status.as_u16(),
                    }
                } else {
                    DeliveryOutcome::Failed {
                        reason: format!("HTTP {}", status.as_u16()),
                    }
                }
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    e.to_string()
                };
                warn!(url, "webhook request error: {}", reason);
                DeliveryOutcome::Failed { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hmac_known_vector() {
        // RFC-style vector: HMAC-SHA256("key", "The quick brown fox
        // jumps over the lazy dog")
        let digest = sign("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(
            digest,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_hmac_deterministic() {
        let body = br#"{"event_type":"payment.succeeded"}"#;
        assert_eq!(sign("whsec_abc", body), sign("whsec_abc", body));
    }

    #[test]
    fn test_hmac_avalanche() {
        let a = sign("whsec_abc", br#"{"amount":1000}"#);
        let b = sign("whsec_abc", br#"{"amount":1001}"#);
        assert_ne!(a, b);
        let c = sign("whsec_abd", br#"{"amount":1000}"#);
        assert_ne!(a, c);
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let digest = sign("secret", b"body");
        assert_eq!(digest.len(), 64);
        assert!(digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_retry_schedule() {
        let base = Duration::from_secs(30);
        let cap = Duration::from_secs(3600);
        assert_eq!(retry_delay(1, base, cap), Duration::from_secs(30));
        assert_eq!(retry_delay(2, base, cap), Duration::from_secs(60));
        assert_eq!(retry_delay(3, base, cap), Duration::from_secs(120));
        assert_eq!(retry_delay(4, base, cap), Duration::from_secs(240));
    }

    #[test]
    fn test_retry_delay_caps() {
        let base = Duration::from_secs(30);
        let cap = Duration::from_secs(3600);
        assert_eq!(retry_delay(8, base, cap), cap);
        assert_eq!(retry_delay(40, base, cap), cap);
    }

    #[test]
    fn test_body_field_order_is_stable() {
        let payload = json!({"payment_id": "pay_x"});
        let body = WebhookBody {
            event_type: "payment.succeeded",
            merchant_id: Uuid::nil(),
            payload: &payload,
            timestamp: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
        .render()
        .unwrap();
        assert!(body.starts_with(r#"{"event_type":"payment.succeeded","merchant_id":"#));
        assert!(body.contains(r#""timestamp":"#));
    }
}
