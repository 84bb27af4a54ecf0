//! Domain Adapters
//!
//! Implementations of the ledger ports backed by PostgreSQL. The adapter
//! translates between domain values and row types and leaves all SQL to the
//! repository layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::adapters::PostgresLedgerAdapter;
//! use domain_ledger::LedgerService;
//!
//! let adapter = Arc::new(PostgresLedgerAdapter::new(pool));
//! let service = LedgerService::new(adapter, clock, settings)?;
//! ```

pub mod ledger;

pub use ledger::{PgLedgerTransaction, PostgresLedgerAdapter};
