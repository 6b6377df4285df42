#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use recovery_service::providers::{OrderApiClient, OrderApiConfig, WorkflowClient, WorkflowConfig};
use recovery_service::scheduler::{RecoveryScheduler, SchedulerConfig};
use recovery_service::store::{CheckoutStore, MemoryCheckoutStore};
use secrecy::SecretString;
use serde_json::Value;
use shared::{NewCheckout, StoreCredential};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Debug, Clone)]
pub struct SeenOrderRequest {
    pub store_id: String,
    pub checkout_id: String,
    pub authentication: Option<String>,
    pub fields: Option<String>,
}

#[derive(Clone)]
pub struct OrderApiMock {
    pub status: StatusCode,
    pub body: Value,
    pub delay: Option<Duration>,
    pub seen: Arc<Mutex<Vec<SeenOrderRequest>>>,
}

impl OrderApiMock {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            delay: None,
            seen: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<SeenOrderRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/:store_id/orders/:checkout_id", get(order_handler))
            .with_state(self.clone());
        spawn_server(app).await
    }
}

async fn order_handler(
    State(mock): State<OrderApiMock>,
    Path((store_id, checkout_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    mock.seen.lock().unwrap().push(SeenOrderRequest {
        store_id,
        checkout_id,
        authentication: headers
            .get("authentication")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        fields: query.get("fields").cloned(),
    });
    if let Some(delay) = mock.delay {
        tokio::time::sleep(delay).await;
    }
    (mock.status, Json(mock.body.clone())).into_response()
}

#[derive(Clone)]
pub struct WorkflowMock {
    pub status: StatusCode,
    pub reply: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl WorkflowMock {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reply: r#"{"status":"success"}"#.to_string(),
            received: Arc::default(),
        }
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/wf", post(workflow_handler))
            .with_state(self.clone());
        format!("{}/wf", spawn_server(app).await)
    }
}

async fn workflow_handler(State(mock): State<WorkflowMock>, Json(body): Json<Value>) -> Response {
    mock.received.lock().unwrap().push(body);
    (mock.status, mock.reply.clone()).into_response()
}

pub struct Harness {
    pub store: Arc<MemoryCheckoutStore>,
    pub scheduler: Arc<RecoveryScheduler>,
}

pub fn build_scheduler(
    store: Arc<MemoryCheckoutStore>,
    order_api_url: &str,
    workflow_url: &str,
    include_order_payload: bool,
    timeout: Duration,
) -> Harness {
    let orders = OrderApiClient::new(&OrderApiConfig {
        base_url: order_api_url.to_string(),
        user_agent: "recovery-tests (tests@example.com)".to_string(),
        timeout,
    })
    .unwrap();
    let notifier = WorkflowClient::new(&WorkflowConfig {
        url: workflow_url.to_string(),
        user_agent: "recovery-tests (tests@example.com)".to_string(),
        timeout,
        include_order_payload,
    })
    .unwrap();
    let scheduler = RecoveryScheduler::new(
        store.clone(),
        Arc::new(orders),
        Arc::new(notifier),
        SchedulerConfig::default(),
    );
    Harness {
        store,
        scheduler: Arc::new(scheduler),
    }
}

pub async fn register_store(store: &MemoryCheckoutStore, store_id: &str, token: &str) {
    store
        .upsert_store(StoreCredential {
            store_id: store_id.to_string(),
            access_token: SecretString::from(token.to_string()),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// A pending checkout whose recovery delay ran out a minute before `now`.
pub async fn due_checkout(store: &MemoryCheckoutStore, checkout_id: &str, store_id: &str, now: DateTime<Utc>) {
    store
        .insert_checkout_if_absent(NewCheckout {
            checkout_id: checkout_id.to_string(),
            store_id: store_id.to_string(),
            cart_url: format!("https://shop.example/checkout/v3/next/{checkout_id}/abc"),
            created_at: now - ChronoDuration::minutes(61),
            check_after: now - ChronoDuration::minutes(1),
        })
        .await
        .unwrap();
}
