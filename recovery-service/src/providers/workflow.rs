use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{http_client, truncate_body, ProviderError, RecoveryNotifier};

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Attach the fetched order document under `order`.
    pub include_order_payload: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryRequest<'a> {
    pub store_id: &'a str,
    pub checkout_id: &'a str,
    pub cart_url: &'a str,
    pub order: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WorkflowPayload<'a> {
    store_id: &'a str,
    order_id: &'a str,
    cart_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<&'a serde_json::Value>,
}

/// Posts recovery requests to the notification workflow.
#[derive(Clone)]
pub struct WorkflowClient {
    client: reqwest::Client,
    url: String,
    include_order_payload: bool,
}

impl WorkflowClient {
    pub fn new(config: &WorkflowConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config.timeout, &config.user_agent)?,
            url: config.url.clone(),
            include_order_payload: config.include_order_payload,
        })
    }

    fn payload<'a>(&self, request: &RecoveryRequest<'a>) -> WorkflowPayload<'a> {
        WorkflowPayload {
            store_id: request.store_id,
            order_id: request.checkout_id,
            cart_url: request.cart_url,
            order: request.order.filter(|_| self.include_order_payload),
        }
    }
}

#[async_trait]
impl RecoveryNotifier for WorkflowClient {
    async fn dispatch(&self, request: RecoveryRequest<'_>) -> Result<(), ProviderError> {
        let payload = self.payload(&request);
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        // Reading the body is part of a successful dispatch; a connection that
        // drops mid-body counts as a failure.
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        debug!(
            checkout_id = request.checkout_id,
            response = %truncate_body(body),
            "Workflow accepted recovery request"
        );
        Ok(())
    }
}
