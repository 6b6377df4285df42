//! Persistence for checkouts and store credentials.
//!
//! The scheduler and the HTTP layer only see [`CheckoutStore`]. The process
//! entry point owns the connection pool and hands a [`PgCheckoutStore`] to
//! both; tests use [`MemoryCheckoutStore`].

mod memory;
mod postgres;

pub use memory::MemoryCheckoutStore;
pub use postgres::{DbPool, PgCheckoutStore};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use shared::{Checkout, CheckoutStatus, NewCheckout, StoreCredential};

/// Upper bound on rows returned by operator listings.
pub const LISTING_LIMIT: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct CheckoutFilter {
    pub store_id: Option<String>,
    pub status: Option<CheckoutStatus>,
}

impl CheckoutFilter {
    pub fn matches(&self, checkout: &Checkout) -> bool {
        self.store_id.as_ref().map_or(true, |id| *id == checkout.store_id)
            && self.status.map_or(true, |status| status == checkout.status)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub store_id: String,
    pub access_token_preview: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StoreCredential> for StoreSummary {
    fn from(store: &StoreCredential) -> Self {
        Self {
            store_id: store.store_id.clone(),
            access_token_preview: shared::token_preview(&store.access_token),
            created_at: store.created_at,
        }
    }
}

#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Inserts or replaces the credential for `store.store_id`.
    async fn upsert_store(&self, store: StoreCredential) -> Result<()>;

    /// Returns `false` when the checkout already existed; the existing row is
    /// left untouched.
    async fn insert_checkout_if_absent(&self, checkout: NewCheckout) -> Result<bool>;

    async fn find_store_by_id(&self, store_id: &str) -> Result<Option<SecretString>>;

    /// Pending checkouts whose `check_after` has elapsed, oldest first.
    async fn select_due_checkouts(&self, now: DateTime<Utc>) -> Result<Vec<Checkout>>;

    /// Moves a pending checkout to `status`. Returns `false` if the checkout
    /// is missing or no longer pending, in which case nothing is written.
    async fn update_checkout_status(
        &self,
        checkout_id: &str,
        status: CheckoutStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Pulls `check_after` forward to `now`. Returns `false` for an unknown id.
    async fn expedite_checkout(&self, checkout_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Removes a store and every checkout recorded for it.
    async fn delete_store(&self, store_id: &str) -> Result<()>;

    /// Newest first, capped at [`LISTING_LIMIT`].
    async fn list_checkouts(&self, filter: &CheckoutFilter) -> Result<Vec<Checkout>>;

    async fn list_stores(&self) -> Result<Vec<StoreSummary>>;

    async fn ping(&self) -> Result<()>;
}
