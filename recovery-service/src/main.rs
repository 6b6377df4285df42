use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use diesel::PgConnection;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection};
use diesel::Connection;
use recovery_service::api::{self, AppState};
use recovery_service::config::Args;
use recovery_service::providers::{OrderApiClient, WorkflowClient};
use recovery_service::scheduler::RecoveryScheduler;
use recovery_service::store::{CheckoutStore, PgCheckoutStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    // Run migrations first
    info!("Running database migrations...");
    let mut conn = PgConnection::establish(&args.database_url)?;
    conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Migrations completed successfully");

    let config = diesel_async::pooled_connection::AsyncDieselConnectionManager::<AsyncPgConnection>::new(&args.database_url);
    let pool = Pool::builder().build(config).await?;
    let store: Arc<dyn CheckoutStore> = Arc::new(PgCheckoutStore::new(pool));

    let orders = Arc::new(OrderApiClient::new(&args.order_api())?);
    let notifier = Arc::new(WorkflowClient::new(&args.workflow())?);
    let scheduler = Arc::new(RecoveryScheduler::new(
        store.clone(),
        orders,
        notifier,
        args.scheduler(),
    ));

    if args.once {
        let report = scheduler.run_once(Utc::now()).await?;
        info!(?report, "Single recovery batch finished");
        return Ok(());
    }

    if args.disable_worker {
        info!("Interval worker disabled, batches run via /run-pending only");
    } else {
        let worker = scheduler.clone();
        tokio::spawn(async move {
            worker.run().await;
        });
        info!(poll_interval_secs = args.poll_interval_secs, "Recovery worker started");
    }

    let app_state = AppState {
        store,
        scheduler,
        settings: Arc::new(args.ingress()),
    };

    let app = api::create_router(app_state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;

    info!("Recovery service listening on port {}", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
