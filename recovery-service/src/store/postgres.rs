use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use secrecy::SecretString;
use shared::{Checkout, CheckoutStatus, NewCheckout, StoreCredential};

use super::{CheckoutFilter, CheckoutStore, StoreSummary, LISTING_LIMIT};
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgCheckoutStore {
    pool: DbPool,
}

impl PgCheckoutStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckoutStore for PgCheckoutStore {
    async fn upsert_store(&self, store: StoreCredential) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let new_store = DbNewStore::from(&store);

        diesel::insert_into(stores::table)
            .values(&new_store)
            .on_conflict(stores::store_id)
            .do_update()
            .set((
                stores::access_token.eq(excluded(stores::access_token)),
                stores::created_at.eq(excluded(stores::created_at)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn insert_checkout_if_absent(&self, checkout: NewCheckout) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let new_checkout = DbNewCheckout::from(checkout);

        let inserted = diesel::insert_into(checkouts::table)
            .values(&new_checkout)
            .on_conflict(checkouts::checkout_id)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(inserted == 1)
    }

    async fn find_store_by_id(&self, store_id: &str) -> Result<Option<SecretString>> {
        let mut conn = self.pool.get().await?;

        let token = stores::table
            .filter(stores::store_id.eq(store_id))
            .select(stores::access_token)
            .first::<String>(&mut conn)
            .await
            .optional()?;

        Ok(token.map(SecretString::from))
    }

    async fn select_due_checkouts(&self, now: DateTime<Utc>) -> Result<Vec<Checkout>> {
        let mut conn = self.pool.get().await?;

        let due = checkouts::table
            .filter(checkouts::status.eq(CheckoutStatus::Pending.as_str()))
            .filter(checkouts::check_after.le(now))
            .order(checkouts::created_at.asc())
            .select(DbCheckout::as_select())
            .load::<DbCheckout>(&mut conn)
            .await?;

        due.into_iter().map(Checkout::try_from).collect()
    }

    async fn update_checkout_status(
        &self,
        checkout_id: &str,
        status: CheckoutStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(
            checkouts::table
                .filter(checkouts::checkout_id.eq(checkout_id))
                .filter(checkouts::status.eq(CheckoutStatus::Pending.as_str())),
        )
        .set((
            checkouts::status.eq(status.as_str()),
            checkouts::processed_at.eq(Some(processed_at)),
        ))
        .execute(&mut conn)
        .await?;

        Ok(updated == 1)
    }

    async fn expedite_checkout(&self, checkout_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(checkouts::table.filter(checkouts::checkout_id.eq(checkout_id)))
            .set(checkouts::check_after.eq(now))
            .execute(&mut conn)
            .await?;

        Ok(updated == 1)
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let store_id = store_id.to_string();

        conn.transaction::<_, anyhow::Error, _>(|conn| {
            Box::pin(async move {
                diesel::delete(checkouts::table.filter(checkouts::store_id.eq(&store_id)))
                    .execute(conn)
                    .await?;

                diesel::delete(stores::table.filter(stores::store_id.eq(&store_id)))
                    .execute(conn)
                    .await?;

                Ok(())
            })
        }).await?;

        Ok(())
    }

    async fn list_checkouts(&self, filter: &CheckoutFilter) -> Result<Vec<Checkout>> {
        let mut conn = self.pool.get().await?;

        let mut query = checkouts::table
            .select(DbCheckout::as_select())
            .into_boxed();
        if let Some(store_id) = &filter.store_id {
            query = query.filter(checkouts::store_id.eq(store_id.clone()));
        }
        if let Some(status) = filter.status {
            query = query.filter(checkouts::status.eq(status.as_str()));
        }

        let rows = query
            .order(checkouts::created_at.desc())
            .limit(LISTING_LIMIT as i64)
            .load::<DbCheckout>(&mut conn)
            .await?;

        rows.into_iter().map(Checkout::try_from).collect()
    }

    async fn list_stores(&self) -> Result<Vec<StoreSummary>> {
        let mut conn = self.pool.get().await?;

        let rows = stores::table
            .select(DbStore::as_select())
            .order(stores::created_at.desc())
            .load::<DbStore>(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(StoreCredential::from)
            .map(|store| StoreSummary::from(&store))
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }
}
