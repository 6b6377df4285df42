use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use shared::{classify, normalize_id, Checkout, CheckoutStatus, OrderOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::credentials::resolve_access_token;
use crate::providers::{OrderStatusSource, RecoveryNotifier, RecoveryRequest};
use crate::store::CheckoutStore;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_concurrency: 4,
        }
    }
}

/// What happened to one due record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Transitioned(CheckoutStatus),
    /// No credential for the store; stays pending for the next run.
    Skipped,
    /// Already terminal when we got to it; nothing written.
    Unchanged,
    /// A store read or write failed; the record stays pending.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub selected: usize,
    pub converted: usize,
    pub no_contact: usize,
    pub abandoned: usize,
    pub error: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Transitioned(CheckoutStatus::Converted) => self.converted += 1,
            RecordOutcome::Transitioned(CheckoutStatus::NoContact) => self.no_contact += 1,
            RecordOutcome::Transitioned(CheckoutStatus::Abandoned) => self.abandoned += 1,
            RecordOutcome::Transitioned(CheckoutStatus::Error) => self.error += 1,
            RecordOutcome::Transitioned(CheckoutStatus::Pending) | RecordOutcome::Unchanged => {
                self.unchanged += 1
            }
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }

    pub fn transitioned(&self) -> usize {
        self.converted + self.no_contact + self.abandoned + self.error
    }
}

/// Drives due checkouts from `pending` to a terminal status.
pub struct RecoveryScheduler {
    store: Arc<dyn CheckoutStore>,
    orders: Arc<dyn OrderStatusSource>,
    notifier: Arc<dyn RecoveryNotifier>,
    config: SchedulerConfig,
    // Held for a whole batch so the interval worker and manual triggers never overlap.
    run_lock: Mutex<()>,
}

impl RecoveryScheduler {
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        orders: Arc<dyn OrderStatusSource>,
        notifier: Arc<dyn RecoveryNotifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            orders,
            notifier,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = self.run_once(Utc::now()).await {
                error!("Error processing due checkouts: {:#}", e);
            }
        }
    }

    /// Processes every checkout that is due at `now`. Only a failure to select
    /// the batch is returned as an error; per-record failures are counted.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("recovery_batch", %run_id);

        async {
            let due = self.store.select_due_checkouts(now).await?;
            let mut report = BatchReport {
                selected: due.len(),
                ..BatchReport::default()
            };
            if due.is_empty() {
                return Ok::<_, anyhow::Error>(report);
            }

            let outcomes: Vec<RecordOutcome> = stream::iter(due)
                .map(|checkout| self.process_checkout(checkout, now))
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

            for outcome in outcomes {
                report.record(outcome);
            }
            info!(?report, "Finished recovery batch");
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(span)
        .await
    }

    pub async fn process_checkout(&self, checkout: Checkout, now: DateTime<Utc>) -> RecordOutcome {
        let checkout_id = normalize_id(&checkout.checkout_id);
        let store_id = normalize_id(&checkout.store_id);

        if checkout.status.is_terminal() {
            return RecordOutcome::Unchanged;
        }
        info!(%checkout_id, %store_id, "Processing checkout");

        let access_token = match resolve_access_token(self.store.as_ref(), &store_id).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!(%checkout_id, %store_id, "No access token for store, skipping");
                return RecordOutcome::Skipped;
            }
            Err(e) => {
                error!(%checkout_id, %store_id, "Failed to resolve access token: {:#}", e);
                return RecordOutcome::Failed;
            }
        };

        let status = match self.orders.fetch_order(&store_id, &checkout_id, &access_token).await {
            Err(e) => {
                warn!(%checkout_id, %store_id, "Order lookup failed: {}", e);
                CheckoutStatus::Error
            }
            Ok(order) => match classify(&order) {
                OrderOutcome::Abandoned => {
                    let request = RecoveryRequest {
                        store_id: &store_id,
                        checkout_id: &checkout_id,
                        cart_url: &checkout.cart_url,
                        order: Some(&order.document),
                    };
                    match self.notifier.dispatch(request).await {
                        Ok(()) => CheckoutStatus::Abandoned,
                        Err(e) => {
                            warn!(%checkout_id, %store_id, "Recovery dispatch failed: {}", e);
                            CheckoutStatus::Error
                        }
                    }
                }
                outcome => CheckoutStatus::from(outcome),
            },
        };

        // Write under the stored key; the row may predate id normalization.
        self.persist(&checkout.checkout_id, status, now).await
    }

    async fn persist(&self, checkout_id: &str, status: CheckoutStatus, now: DateTime<Utc>) -> RecordOutcome {
        match self.store.update_checkout_status(checkout_id, status, now).await {
            Ok(true) => {
                info!(checkout_id, %status, "Checkout marked");
                RecordOutcome::Transitioned(status)
            }
            Ok(false) => {
                warn!(checkout_id, %status, "Checkout was no longer pending, status left as is");
                RecordOutcome::Unchanged
            }
            Err(e) => {
                error!(checkout_id, %status, "Failed to persist checkout status: {:#}", e);
                RecordOutcome::Failed
            }
        }
    }
}
