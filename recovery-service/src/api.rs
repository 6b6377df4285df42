use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::error::ApiError;
use crate::scheduler::{BatchReport, RecoveryScheduler};
use crate::store::{CheckoutFilter, CheckoutStore, StoreSummary};

const DEBUG_SECRET_HEADER: &str = "x-debug-secret";
const SHARED_SECRET_HEADER: &str = "x-shared-secret";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CheckoutStore>,
    pub scheduler: Arc<RecoveryScheduler>,
    pub settings: Arc<IngressSettings>,
}

#[derive(Debug, Clone)]
pub struct IngressSettings {
    /// Guards the operator endpoints. When unset they always answer 403.
    pub debug_secret: Option<SecretString>,
    /// How long after creation a checkout becomes due.
    pub recovery_delay: Duration,
}

impl IngressSettings {
    fn secret_matches(&self, candidate: Option<&str>) -> bool {
        match (&self.debug_secret, candidate) {
            (Some(secret), Some(candidate)) => secret.expose_secret() == candidate,
            _ => false,
        }
    }

    fn authorize(&self, headers: &HeaderMap, query_secret: Option<&str>) -> Result<(), ApiError> {
        let header_secret = headers
            .get(DEBUG_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if self.secret_matches(header_secret.or(query_secret)) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SecretQuery {
    pub secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutListQuery {
    pub secret: Option<String>,
    pub store_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub store_id: Option<RawId>,
    pub order_id: Option<RawId>,
    pub checkout_id: Option<RawId>,
    pub cart_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub ok: bool,
    pub created: bool,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterStoreRequest {
    pub store_id: Option<RawId>,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRefRequest {
    pub checkout_id: Option<RawId>,
    pub order_id: Option<RawId>,
}

#[derive(Debug, Deserialize)]
pub struct StoreRefRequest {
    pub store_id: Option<RawId>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RunPendingResponse {
    pub ok: bool,
    pub processed: usize,
    pub report: BatchReport,
}

#[derive(Debug, Serialize)]
pub struct ExpediteResponse {
    pub ok: bool,
    pub checkout_id: String,
    /// Milliseconds since the epoch.
    pub new_check_after: i64,
    pub new_scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeleteStoreResponse {
    pub ok: bool,
    pub deleted: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutListResponse {
    pub checkouts: Vec<Checkout>,
}

#[derive(Debug, Serialize)]
pub struct StoreListResponse {
    pub stores: Vec<StoreSummary>,
}

#[derive(Debug, Serialize)]
pub struct DbCheckResponse {
    pub ok: bool,
    pub result: i32,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/checkout", post(create_checkout))
        .route("/register_store", post(register_store))
        .route("/run-pending", post(run_pending))
        .route("/process_checkout", post(expedite_checkout))
        .route("/delete_store", post(delete_store))
        .route("/debug/checkouts", get(list_checkouts))
        .route("/debug/stores", get(list_stores))
        .route("/debug/db", get(check_db))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// First of the candidates that normalizes to a non-empty id.
fn first_id(candidates: &[Option<&RawId>]) -> String {
    candidates
        .iter()
        .map(|raw| normalize_optional(*raw))
        .find(|id| !id.is_empty())
        .unwrap_or_default()
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let Json(request) = payload?;
    let store_id = normalize_optional(request.store_id.as_ref());
    let checkout_id = first_id(&[request.order_id.as_ref(), request.checkout_id.as_ref()]);
    let cart_url = request.cart_url.unwrap_or_default();
    if store_id.is_empty() || checkout_id.is_empty() || cart_url.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "store_id, order_id and cart_url are required".to_string(),
        ));
    }

    let now = Utc::now();
    let check_after = now + state.settings.recovery_delay;
    let created = state
        .store
        .insert_checkout_if_absent(NewCheckout {
            checkout_id: checkout_id.clone(),
            store_id: store_id.clone(),
            cart_url,
            created_at: now,
            check_after,
        })
        .await?;

    if created {
        tracing::info!(%checkout_id, %store_id, %check_after, "Checkout scheduled");
    } else {
        tracing::debug!(%checkout_id, %store_id, "Checkout already registered");
    }

    Ok(Json(CreateCheckoutResponse {
        ok: true,
        created,
        scheduled_for: check_after,
    }))
}

pub async fn register_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RegisterStoreRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    // Installer scripts that predate the shared secret send no header at all.
    if let Some(value) = headers.get(SHARED_SECRET_HEADER) {
        if !state.settings.secret_matches(value.to_str().ok()) {
            return Err(ApiError::Forbidden);
        }
    }
    let Json(request) = payload?;

    let store_id = normalize_optional(request.store_id.as_ref());
    let access_token = request.access_token.unwrap_or_default();
    if store_id.is_empty() || access_token.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "store_id and access_token are required".to_string(),
        ));
    }

    state
        .store
        .upsert_store(StoreCredential {
            store_id: store_id.clone(),
            access_token: SecretString::from(access_token),
            created_at: Utc::now(),
        })
        .await?;
    tracing::info!(%store_id, "Store registered");

    Ok(Json(OkResponse {
        ok: true,
        message: "store registered".to_string(),
    }))
}

pub async fn run_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
) -> Result<Json<RunPendingResponse>, ApiError> {
    state.settings.authorize(&headers, query.secret.as_deref())?;

    let report = state.scheduler.run_once(Utc::now()).await?;
    Ok(Json(RunPendingResponse {
        ok: true,
        processed: report.selected,
        report,
    }))
}

pub async fn expedite_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    payload: Result<Json<CheckoutRefRequest>, JsonRejection>,
) -> Result<Json<ExpediteResponse>, ApiError> {
    state.settings.authorize(&headers, query.secret.as_deref())?;
    let Json(request) = payload?;

    let checkout_id = first_id(&[request.checkout_id.as_ref(), request.order_id.as_ref()]);
    if checkout_id.is_empty() {
        return Err(ApiError::BadRequest(
            "checkout_id (or order_id) is required".to_string(),
        ));
    }

    let now = Utc::now();
    if !state.store.expedite_checkout(&checkout_id, now).await? {
        return Err(ApiError::NotFound(format!("checkout {checkout_id}")));
    }
    tracing::info!(%checkout_id, "Checkout expedited");

    Ok(Json(ExpediteResponse {
        ok: true,
        checkout_id,
        new_check_after: now.timestamp_millis(),
        new_scheduled_for: now,
    }))
}

pub async fn delete_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    payload: Result<Json<StoreRefRequest>, JsonRejection>,
) -> Result<Json<DeleteStoreResponse>, ApiError> {
    state.settings.authorize(&headers, query.secret.as_deref())?;
    let Json(request) = payload?;

    let store_id = normalize_optional(request.store_id.as_ref());
    if store_id.is_empty() {
        return Err(ApiError::BadRequest("store_id is required".to_string()));
    }

    state.store.delete_store(&store_id).await?;
    tracing::info!(%store_id, "Store deleted with its checkouts");

    Ok(Json(DeleteStoreResponse {
        ok: true,
        deleted: store_id,
    }))
}

pub async fn list_checkouts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CheckoutListQuery>,
) -> Result<Json<CheckoutListResponse>, ApiError> {
    state.settings.authorize(&headers, query.secret.as_deref())?;

    let status = query
        .status
        .filter(|status| !status.is_empty())
        .map(|status| status.parse::<CheckoutStatus>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let filter = CheckoutFilter {
        store_id: query
            .store_id
            .map(|id| normalize_id(&id))
            .filter(|id| !id.is_empty()),
        status,
    };

    let checkouts = state.store.list_checkouts(&filter).await?;
    Ok(Json(CheckoutListResponse { checkouts }))
}

pub async fn list_stores(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
) -> Result<Json<StoreListResponse>, ApiError> {
    state.settings.authorize(&headers, query.secret.as_deref())?;

    let stores = state.store.list_stores().await?;
    Ok(Json(StoreListResponse { stores }))
}

pub async fn check_db(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
) -> Result<Json<DbCheckResponse>, ApiError> {
    state.settings.authorize(&headers, query.secret.as_deref())?;

    state.store.ping().await?;
    Ok(Json(DbCheckResponse { ok: true, result: 1 }))
}
