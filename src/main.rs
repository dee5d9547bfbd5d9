use bank_core::config::Settings;
use bank_core::observability::{init_logging, init_metrics, LogConfig, Metrics};
use bank_core::repositories::Transactor;
use bank_core::services::{AccountService, LedgerService};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    init_logging(&LogConfig::from(&settings.application));
    info!("Configuration loaded");

    init_metrics()?;
    let metrics = Metrics::new();

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout_secs))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied successfully");

    let transactor = Transactor::with_settings(pool.clone(), settings.transactor());
    let _accounts = AccountService::new(transactor, metrics);
    let ledger = LedgerService::new(pool, &settings.ledger);

    info!(
        page_size = ledger.page_size(),
        lock_timeout_ms = settings.database.lock_timeout_ms,
        "Bank core ready"
    );

    Ok(())
}
