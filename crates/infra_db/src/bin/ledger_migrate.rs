//! Tuition Ledger - schema migration binary
//!
//! Connects to the configured database and applies every pending migration
//! embedded from `migrations/`.
//!
//! # Usage
//!
//! ```bash
//! LEDGER__DATABASE__URL=postgres://localhost/tuition_ledger cargo run --bin ledger-migrate
//! ```
//!
//! # Environment Variables
//!
//! * `LEDGER__DATABASE__URL` - PostgreSQL connection string
//! * `LEDGER__DATABASE__MAX_CONNECTIONS` - Pool size (default: 10)
//! * `LEDGER__LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `RUST_LOG` - Overrides the log level with a full filter directive

use anyhow::Context;
use infra_db::{create_pool, run_migrations, AppConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    init_tracing(&config.log_level);

    tracing::info!(
        max_connections = config.database.max_connections,
        timezone = %config.ledger.timezone,
        "Starting tuition ledger migrations"
    );

    let pool = create_pool(config.database.pool_config())
        .await
        .context("connecting to the database")?;

    run_migrations(&pool).await.context("applying migrations")?;

    pool.close().await;
    tracing::info!("Migrations complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
