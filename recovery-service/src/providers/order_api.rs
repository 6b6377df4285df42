use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use shared::OrderSnapshot;
use std::time::Duration;
use tracing::debug;

use super::{http_client, truncate_body, OrderStatusSource, ProviderError};

/// Fields requested from the order API. The classifier needs only
/// `completed_at` and `contact_phone`; the rest is forwarded to the workflow
/// when the full payload is enabled.
const ORDER_FIELDS: &str = "id,number,token,contact_name,contact_phone,shipping_store_branch_name,\
shipping_pickup_type,shipping_store_branch_extra,shipping_carrier_name,completed_at,total,products,\
payment_status,shipping_status";

#[derive(Debug, Clone)]
pub struct OrderApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Client for `GET {base_url}/{store_id}/orders/{checkout_id}`.
#[derive(Clone)]
pub struct OrderApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OrderApiClient {
    pub fn new(config: &OrderApiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config.timeout, &config.user_agent)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn order_url(&self, store_id: &str, checkout_id: &str) -> String {
        format!("{}/{}/orders/{}", self.base_url, store_id, checkout_id)
    }
}

#[async_trait]
impl OrderStatusSource for OrderApiClient {
    async fn fetch_order(
        &self,
        store_id: &str,
        checkout_id: &str,
        access_token: &SecretString,
    ) -> Result<OrderSnapshot, ProviderError> {
        let response = self
            .client
            .get(self.order_url(store_id, checkout_id))
            .query(&[("fields", ORDER_FIELDS)])
            // The order API reads its token from `Authentication`, not `Authorization`.
            .header("Authentication", format!("bearer {}", access_token.expose_secret()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let document: serde_json::Value = response.json().await?;
        debug!(
            store_id,
            checkout_id,
            completed_at = %document.get("completed_at").unwrap_or(&serde_json::Value::Null),
            "Fetched order"
        );
        OrderSnapshot::from_document(document).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
