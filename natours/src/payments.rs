//! Hosted checkout sessions
//!
//! [`PaymentGateway`] creates a checkout session for one tour. The Stripe
//! implementation posts form-encoded parameters to
//! `{api_base}/v1/checkout/sessions`; the mock records requests for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::PaymentsConfig;
use crate::error::{Error, Result};

/// One purchasable line
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    /// Price in the smallest currency unit
    pub unit_amount: u64,
    pub currency: String,
    pub quantity: u32,
}

/// Everything needed to open a checkout session
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    pub client_reference_id: String,
    pub line_item: LineItem,
}

impl CheckoutRequest {
    /// Form fields in Stripe's bracketed notation
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let item = &self.line_item;
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("customer_email".to_string(), self.customer_email.clone()),
            ("client_reference_id".to_string(), self.client_reference_id.clone()),
            ("line_items[0][quantity]".to_string(), item.quantity.to_string()),
            ("line_items[0][price_data][currency]".to_string(), item.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), item.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), item.name.clone()),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                item.description.clone(),
            ),
        ];
        for (i, image) in item.images.iter().enumerate() {
            fields.push((
                format!("line_items[0][price_data][product_data][images][{i}]"),
                image.clone(),
            ));
        }
        fields
    }
}

/// Creates checkout sessions
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a session; the returned JSON is passed to the client unchanged
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<Value>;
}

/// Stripe REST client
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    /// Client for the configured account
    pub fn new(config: &PaymentsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<Value> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&request.form_fields())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Payment(format!("gateway answered {status}: {body}")));
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Gateway that records requests and fabricates sessions
#[derive(Clone, Default)]
pub struct MockGateway {
    requests: Arc<Mutex<Vec<CheckoutRequest>>>,
}

impl MockGateway {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<Value> {
        let mut requests = self.requests.lock().await;
        requests.push(request.clone());
        Ok(json!({
            "id": format!("cs_test_{}", requests.len()),
            "object": "checkout.session",
            "client_reference_id": request.client_reference_id,
            "customer_email": request.customer_email,
            "amount_total": request.line_item.unit_amount * u64::from(request.line_item.quantity),
            "currency": request.line_item.currency,
            "url": format!("https://checkout.invalid/pay/cs_test_{}", requests.len()),
        }))
    }
}
