//! Ledger Port Adapters
//!
//! The PostgreSQL adapter lives in `infra_db`; this module holds the
//! in-memory adapter used by tests and local tooling.

pub mod memory;

pub use memory::InMemoryLedger;
