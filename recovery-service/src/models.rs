use chrono::{DateTime, Utc};
use diesel::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use shared::*;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::checkouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbCheckout {
    pub checkout_id: String,
    pub store_id: String,
    pub cart_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub check_after: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::checkouts)]
pub struct DbNewCheckout {
    pub checkout_id: String,
    pub store_id: String,
    pub cart_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub check_after: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::stores)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbStore {
    pub store_id: String,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::stores)]
pub struct DbNewStore {
    pub store_id: String,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

impl From<NewCheckout> for DbNewCheckout {
    fn from(checkout: NewCheckout) -> Self {
        Self {
            checkout_id: checkout.checkout_id,
            store_id: checkout.store_id,
            cart_url: checkout.cart_url,
            status: CheckoutStatus::Pending.as_str().to_string(),
            created_at: checkout.created_at,
            check_after: checkout.check_after,
        }
    }
}

impl TryFrom<DbCheckout> for Checkout {
    type Error = anyhow::Error;

    fn try_from(db_checkout: DbCheckout) -> Result<Self, Self::Error> {
        let status = db_checkout.status.parse::<CheckoutStatus>()?;
        Ok(Self {
            checkout_id: db_checkout.checkout_id,
            store_id: db_checkout.store_id,
            cart_url: db_checkout.cart_url,
            status,
            created_at: db_checkout.created_at,
            check_after: db_checkout.check_after,
            processed_at: db_checkout.processed_at,
        })
    }
}

impl From<&StoreCredential> for DbNewStore {
    fn from(store: &StoreCredential) -> Self {
        Self {
            store_id: store.store_id.clone(),
            access_token: store.access_token.expose_secret().to_string(),
            created_at: store.created_at,
        }
    }
}

impl From<DbStore> for StoreCredential {
    fn from(db_store: DbStore) -> Self {
        Self {
            store_id: db_store.store_id,
            access_token: SecretString::from(db_store.access_token),
            created_at: db_store.created_at,
        }
    }
}
