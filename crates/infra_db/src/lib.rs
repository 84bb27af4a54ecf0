//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL infrastructure for the tuition ledger:
//! connection pooling, embedded migrations, environment configuration and the
//! adapter that implements the ledger ports with row-level locking.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. [`LedgerRepository`] owns every
//! SQL statement; [`PostgresLedgerAdapter`] implements the domain's
//! `LedgerPort` on top of it and translates errors into `PortError`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, AppConfig, PostgresLedgerAdapter};
//!
//! let config = AppConfig::load()?;
//! let pool = create_pool(config.database.pool_config()).await?;
//! run_migrations(&pool).await?;
//! let adapter = PostgresLedgerAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod settings;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, run_migrations, MIGRATOR};
pub use error::DatabaseError;
pub use settings::{AppConfig, DatabaseSettings};
pub use repositories::LedgerRepository;
pub use adapters::PostgresLedgerAdapter;
