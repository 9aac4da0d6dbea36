//! Outbound client for the payment processor's API.
//!
//! The only call the server makes is creating a payment session at checkout. The processor talks back to us
//! asynchronously through the settlement webhook, which is handled in `webhook_routes`.
use std::sync::Arc;

use log::*;
use pasar_engine::db_types::Order;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize the gateway client. {0}")]
    Initialize(String),
    #[error("Error communicating with the payment gateway. {0}")]
    Transport(#[from] reqwest::Error),
    #[error("The payment gateway rejected the request. {0}")]
    ApiError(String),
}

/// A payment session created at the processor. The token is stored on the order; the redirect URL is handed to the
/// buyer to complete payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        // The processor uses HTTP basic auth with the server key as username and an empty password.
        let auth = format!("Basic {}", base64::encode(format!("{}:", config.server_key.reveal())));
        let mut auth = HeaderValue::from_str(&auth).map_err(|e| GatewayError::Initialize(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| GatewayError::Initialize(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Creates a payment session for a gateway order. The gross amount charged to the buyer includes the gateway
    /// fee, so it is the order's [`Order::gross_due`], not its total.
    pub async fn create_payment_session(&self, order: &Order) -> Result<PaymentSession, GatewayError> {
        let url = self.url("/snap/v1/transactions");
        let body = json!({
            "transaction_details": {
                "order_id": order.order_id.as_str(),
                "gross_amount": order.gross_due().value(),
            },
        });
        debug!("💳️ Requesting payment session for order {}", order.order_id);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_else(|_| "<no response body>".to_string());
            return Err(GatewayError::ApiError(format!("{status}: {detail}")));
        }
        let session = response.json::<PaymentSession>().await?;
        trace!("💳️ Payment session created for order {}", order.order_id);
        Ok(session)
    }
}
