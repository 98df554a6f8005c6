//!
//! Documentation of the payment module.
//! Opens gateway orders and checks the signatures the gateway hands back.
//!

use super::config;
use super::rides;

pub mod gateway;

use rides::error::RideResult;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// What the client needs to open the gateway checkout
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_id: String,
    pub amount: f64,
    /// Amount in the currency's smallest unit, as the gateway expects it
    pub amount_minor: i64,
    pub currency: String,
    pub key_id: String,
}

#[rocket::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount: f64, ride_id: &str, user_id: &str) -> RideResult<PaymentOrder>;

    /// True only if `signature` is the gateway's signature over the order and payment ids
    fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Converts a major-unit amount (rupees) to minor units (paise)
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Hex HMAC-SHA256 of `order_id|payment_id`
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(value) => value,
        Err(_) => return String::new(),
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a hex signature against the expected HMAC
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = match hex::decode(signature.trim()) {
        Ok(value) => value,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(value) => value,
        Err(_) => return false,
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let signature = sign("secret", "order_1", "pay_1");
        assert_eq!(signature.len(), 64);
        assert!(verify_signature("secret", "order_1", "pay_1", &signature));
    }

    #[test]
    fn tampered_signatures_fail() {
        let signature = sign("secret", "order_1", "pay_1");
        assert!(!verify_signature("other", "order_1", "pay_1", &signature));
        assert!(!verify_signature("secret", "order_2", "pay_1", &signature));
        assert!(!verify_signature("secret", "order_1", "pay_2", &signature));
        assert!(!verify_signature("secret", "order_1", "pay_1", "not-hex"));
        assert!(!verify_signature("secret", "order_1", "pay_1", ""));
    }

    #[test]
    fn known_vector() {
        // HMAC-SHA256(key = "key", "The quick brown fox jumps over the lazy dog")
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(
            hex::encode(mac.finalize().into_bytes()),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn minor_units_round() {
        assert_eq!(to_minor_units(100.0), 10_000);
        assert_eq!(to_minor_units(12.34), 1_234);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
    }
}
