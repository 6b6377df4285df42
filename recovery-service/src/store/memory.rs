use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use shared::{Checkout, CheckoutStatus, NewCheckout, StoreCredential};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CheckoutFilter, CheckoutStore, StoreSummary, LISTING_LIMIT};

/// Process-local store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryCheckoutStore {
    checkouts: RwLock<HashMap<String, Checkout>>,
    stores: RwLock<HashMap<String, StoreCredential>>,
}

impl MemoryCheckoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_checkout(&self, checkout_id: &str) -> Option<Checkout> {
        self.checkouts.read().await.get(checkout_id).cloned()
    }

    /// Writes a checkout as-is, bypassing the pending-only guard.
    pub async fn put_checkout(&self, checkout: Checkout) {
        self.checkouts
            .write()
            .await
            .insert(checkout.checkout_id.clone(), checkout);
    }
}

#[async_trait]
impl CheckoutStore for MemoryCheckoutStore {
    async fn upsert_store(&self, store: StoreCredential) -> Result<()> {
        self.stores
            .write()
            .await
            .insert(store.store_id.clone(), store);
        Ok(())
    }

    async fn insert_checkout_if_absent(&self, checkout: NewCheckout) -> Result<bool> {
        let mut checkouts = self.checkouts.write().await;
        if checkouts.contains_key(&checkout.checkout_id) {
            return Ok(false);
        }
        checkouts.insert(checkout.checkout_id.clone(), Checkout::new(checkout));
        Ok(true)
    }

    async fn find_store_by_id(&self, store_id: &str) -> Result<Option<SecretString>> {
        Ok(self
            .stores
            .read()
            .await
            .get(store_id)
            .map(|store| store.access_token.clone()))
    }

    async fn select_due_checkouts(&self, now: DateTime<Utc>) -> Result<Vec<Checkout>> {
        let mut due: Vec<Checkout> = self
            .checkouts
            .read()
            .await
            .values()
            .filter(|checkout| checkout.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.checkout_id.cmp(&b.checkout_id))
        });
        Ok(due)
    }

    async fn update_checkout_status(
        &self,
        checkout_id: &str,
        status: CheckoutStatus,
        processed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut checkouts = self.checkouts.write().await;
        match checkouts.get_mut(checkout_id) {
            Some(checkout) if checkout.status == CheckoutStatus::Pending => {
                checkout.status = status;
                checkout.processed_at = Some(processed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expedite_checkout(&self, checkout_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut checkouts = self.checkouts.write().await;
        match checkouts.get_mut(checkout_id) {
            Some(checkout) => {
                checkout.check_after = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        let mut checkouts = self.checkouts.write().await;
        let mut stores = self.stores.write().await;
        checkouts.retain(|_, checkout| checkout.store_id != store_id);
        stores.remove(store_id);
        Ok(())
    }

    async fn list_checkouts(&self, filter: &CheckoutFilter) -> Result<Vec<Checkout>> {
        let mut rows: Vec<Checkout> = self
            .checkouts
            .read()
            .await
            .values()
            .filter(|checkout| filter.matches(checkout))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(LISTING_LIMIT);
        Ok(rows)
    }

    async fn list_stores(&self) -> Result<Vec<StoreSummary>> {
        let mut rows: Vec<StoreSummary> = self
            .stores
            .read()
            .await
            .values()
            .map(StoreSummary::from)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use secrecy::ExposeSecret;

    fn new_checkout(id: &str, store_id: &str, created_at: DateTime<Utc>) -> NewCheckout {
        NewCheckout {
            checkout_id: id.to_string(),
            store_id: store_id.to_string(),
            cart_url: format!("https://shop.example/checkout/{id}"),
            created_at,
            check_after: created_at + Duration::minutes(60),
        }
    }

    #[tokio::test]
    async fn duplicate_creation_is_a_noop() {
        let store = MemoryCheckoutStore::new();
        let now = Utc::now();

        assert!(store.insert_checkout_if_absent(new_checkout("c1", "s1", now)).await.unwrap());
        store.update_checkout_status("c1", CheckoutStatus::Converted, now).await.unwrap();

        let mut again = new_checkout("c1", "s1", now + Duration::hours(3));
        again.cart_url = "https://shop.example/other".into();
        assert!(!store.insert_checkout_if_absent(again).await.unwrap());

        let stored = store.get_checkout("c1").await.unwrap();
        assert_eq!(stored.status, CheckoutStatus::Converted);
        assert_eq!(stored.check_after, now + Duration::minutes(60));
        assert_eq!(stored.cart_url, "https://shop.example/checkout/c1");
    }

    #[tokio::test]
    async fn upsert_replaces_credential() {
        let store = MemoryCheckoutStore::new();
        let first = Utc::now();
        let second = first + Duration::minutes(5);

        for (token, created_at) in [("old-token", first), ("new-token", second)] {
            store
                .upsert_store(StoreCredential {
                    store_id: "s1".into(),
                    access_token: SecretString::from(token.to_string()),
                    created_at,
                })
                .await
                .unwrap();
        }

        let token = store.find_store_by_id("s1").await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "new-token");
        let stores = store.list_stores().await.unwrap();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].created_at, second);
    }

    #[tokio::test]
    async fn due_selection_filters_status_and_time() {
        let store = MemoryCheckoutStore::new();
        let now = Utc::now();

        store.insert_checkout_if_absent(new_checkout("late", "s1", now - Duration::hours(2))).await.unwrap();
        store.insert_checkout_if_absent(new_checkout("early", "s1", now - Duration::hours(3))).await.unwrap();
        store.insert_checkout_if_absent(new_checkout("fresh", "s1", now)).await.unwrap();
        store.insert_checkout_if_absent(new_checkout("done", "s1", now - Duration::hours(4))).await.unwrap();
        store.update_checkout_status("done", CheckoutStatus::Abandoned, now).await.unwrap();

        let due: Vec<String> = store
            .select_due_checkouts(now)
            .await
            .unwrap()
            .into_iter()
            .map(|checkout| checkout.checkout_id)
            .collect();
        assert_eq!(due, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn terminal_status_is_not_overwritten() {
        let store = MemoryCheckoutStore::new();
        let now = Utc::now();
        store.insert_checkout_if_absent(new_checkout("c1", "s1", now)).await.unwrap();

        assert!(store.update_checkout_status("c1", CheckoutStatus::Error, now).await.unwrap());
        let later = now + Duration::minutes(1);
        assert!(!store.update_checkout_status("c1", CheckoutStatus::Converted, later).await.unwrap());
        assert!(!store.update_checkout_status("missing", CheckoutStatus::Converted, later).await.unwrap());

        let stored = store.get_checkout("c1").await.unwrap();
        assert_eq!(stored.status, CheckoutStatus::Error);
        assert_eq!(stored.processed_at, Some(now));
    }

    #[tokio::test]
    async fn delete_store_removes_its_checkouts() {
        let store = MemoryCheckoutStore::new();
        let now = Utc::now();
        store
            .upsert_store(StoreCredential {
                store_id: "s1".into(),
                access_token: SecretString::from("token".to_string()),
                created_at: now,
            })
            .await
            .unwrap();
        store.insert_checkout_if_absent(new_checkout("a", "s1", now)).await.unwrap();
        store.insert_checkout_if_absent(new_checkout("b", "s2", now)).await.unwrap();

        store.delete_store("s1").await.unwrap();

        assert!(store.find_store_by_id("s1").await.unwrap().is_none());
        assert!(store.get_checkout("a").await.is_none());
        assert!(store.get_checkout("b").await.is_some());
    }

    #[tokio::test]
    async fn listing_applies_filters_newest_first() {
        let store = MemoryCheckoutStore::new();
        let now = Utc::now();
        store.insert_checkout_if_absent(new_checkout("a", "s1", now - Duration::minutes(2))).await.unwrap();
        store.insert_checkout_if_absent(new_checkout("b", "s1", now - Duration::minutes(1))).await.unwrap();
        store.insert_checkout_if_absent(new_checkout("c", "s2", now)).await.unwrap();
        store.update_checkout_status("a", CheckoutStatus::NoContact, now).await.unwrap();

        let filter = CheckoutFilter {
            store_id: Some("s1".into()),
            status: None,
        };
        let ids: Vec<String> = store
            .list_checkouts(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|checkout| checkout.checkout_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        let filter = CheckoutFilter {
            store_id: None,
            status: Some(CheckoutStatus::NoContact),
        };
        assert_eq!(store.list_checkouts(&filter).await.unwrap().len(), 1);
    }
}
