//! HTTP collaborators of the scheduler: the order API that tells us whether
//! a checkout was paid, and the workflow endpoint that sends the recovery
//! message.

mod order_api;
mod workflow;

pub use order_api::{OrderApiClient, OrderApiConfig};
pub use workflow::{RecoveryRequest, WorkflowClient, WorkflowConfig};

use async_trait::async_trait;
use secrecy::SecretString;
use shared::OrderSnapshot;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[async_trait]
pub trait OrderStatusSource: Send + Sync {
    async fn fetch_order(
        &self,
        store_id: &str,
        checkout_id: &str,
        access_token: &SecretString,
    ) -> Result<OrderSnapshot, ProviderError>;
}

#[async_trait]
pub trait RecoveryNotifier: Send + Sync {
    /// One attempt, no retry.
    async fn dispatch(&self, request: RecoveryRequest<'_>) -> Result<(), ProviderError>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, ProviderError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Keeps error bodies short enough to log.
pub(crate) fn truncate_body(body: String) -> String {
    const MAX_CHARS: usize = 512;
    if body.chars().count() <= MAX_CHARS {
        return body;
    }
    let mut truncated: String = body.chars().take(MAX_CHARS).collect();
    truncated.push_str("...");
    truncated
}
