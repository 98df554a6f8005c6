use super::*;
use config::config::ConfyConfig;
use rides::error::RideError;

use hyper::{
    header::{Authorization, Basic, ContentType, UserAgent},
    net::HttpsConnector,
    Client,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use log::{error, info};

const RAZORPAY_ORDERS: &str = "https://api.razorpay.com/v1/orders";

/// Razorpay caps receipts at 40 characters
const RECEIPT_LIMIT: usize = 40;

fn receipt(ride_id: &str, user_id: &str) -> String {
    let full = format!("ride_{}_{}", ride_id, user_id);
    full.chars().take(RECEIPT_LIMIT).collect()
}

/// Razorpay orders API
pub struct RazorpayGateway {
    key_id: String,
    key_secret: String,
    currency: String,
}

#[derive(Deserialize, Debug)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
}

impl RazorpayGateway {
    pub fn new(config: &ConfyConfig) -> RazorpayGateway {
        RazorpayGateway {
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
            currency: config.payment_currency.clone(),
        }
    }

    /// Blocking call, run it off the async runtime
    fn post_order(key_id: String, key_secret: String, body: String) -> anyhow::Result<RazorpayOrder> {
        use anyhow::Context;

        let https = HttpsConnector::new(hyper_sync_rustls::TlsClient::new());
        let client = Client::with_connector(https);

        let response = client
            .post(RAZORPAY_ORDERS)
            .header(Authorization(Basic { username: key_id, password: Some(key_secret) }))
            .header(ContentType::json())
            .header(UserAgent("Carpool".into()))
            .body(&body[..])
            .send()
            .context("failed to send request to the payment gateway")?;

        if !response.status.is_success() {
            return Err(anyhow::anyhow!("payment gateway answered {}", response.status));
        }

        let order: RazorpayOrder = serde_json::from_reader(response)
            .context("failed to deserialize the gateway order")?;
        Ok(order)
    }
}

#[rocket::async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, amount: f64, ride_id: &str, user_id: &str) -> RideResult<PaymentOrder> {
        let body = json!({
            "amount": to_minor_units(amount),
            "currency": self.currency,
            "receipt": receipt(ride_id, user_id),
            "notes": { "rideId": ride_id, "userId": user_id },
        }).to_string();

        let key_id = self.key_id.clone();
        let key_secret = self.key_secret.clone();
        let order = rocket::tokio::task::spawn_blocking(move || RazorpayGateway::post_order(key_id, key_secret, body))
            .await
            .map_err(|e| RideError::Gateway(format!("Payment gateway task failed: {}", e)))?;

        match order {
            Ok(order) => {
                info!("{}", format!("Server>>Gateway:\tOpened order {} for ride {} ({})", order.id, ride_id, user_id));
                Ok(PaymentOrder {
                    order_id: order.id,
                    amount: order.amount as f64 / 100.0,
                    amount_minor: order.amount,
                    currency: order.currency,
                    key_id: self.key_id.clone(),
                })
            },
            Err(value) => {
                error!("{}", format!("Gateway failed while opening an order for ride {}: {:#}", ride_id, value));
                Err(RideError::Gateway("Could not create a payment order".into()))
            },
        }
    }

    fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

/// Offline gateway for development and tests.
/// Orders get random ids; signatures use the configured secret.
pub struct LocalGateway {
    key_id: String,
    key_secret: String,
    currency: String,
}

impl LocalGateway {
    pub fn new(config: &ConfyConfig) -> LocalGateway {
        LocalGateway {
            key_id: if config.payment_key_id.is_empty() { "local".into() } else { config.payment_key_id.clone() },
            key_secret: config.payment_key_secret.clone(),
            currency: config.payment_currency.clone(),
        }
    }
}

#[rocket::async_trait]
impl PaymentGateway for LocalGateway {
    async fn create_order(&self, amount: f64, ride_id: &str, user_id: &str) -> RideResult<PaymentOrder> {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(14)
            .map(char::from)
            .collect();
        let order_id = format!("order_{}", suffix);

        info!("{}", format!("Server>>Gateway:\tOpened local order {} for ride {} ({})", order_id, ride_id, user_id));
        Ok(PaymentOrder {
            order_id,
            amount,
            amount_minor: to_minor_units(amount),
            currency: self.currency.clone(),
            key_id: self.key_id.clone(),
        })
    }

    fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

/// Picks the gateway named by `payment_provider`
pub fn from_config(config: &ConfyConfig) -> Arc<dyn PaymentGateway> {
    match config.payment_provider.trim().to_ascii_lowercase().as_str() {
        "razorpay" => Arc::new(RazorpayGateway::new(config)),
        _ => Arc::new(LocalGateway::new(config)),
    }
}
