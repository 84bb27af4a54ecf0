//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! tuition ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Fixed dates, amounts, and a seeded in-memory ledger world
//! - `builders`: Builder patterns for ledger requests
//! - `database`: PostgreSQL testcontainer with the schema applied
//! - `assertions`: Custom assertion helpers for ledger types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
