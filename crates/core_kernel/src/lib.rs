//! Core Kernel - Foundational types for the tuition ledger
//!
//! This crate provides the building blocks shared by the ledger engine and its
//! persistence adapters:
//! - Money with exact two-decimal arithmetic
//! - Strongly-typed identifiers
//! - An injectable clock bound to the institute's timezone
//! - Port error types for adapter boundaries

pub mod money;
pub mod clock;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Money, MoneyError};
pub use clock::{Clock, SystemClock, FixedClock, Timezone};
pub use identifiers::{
    StudentId, EnrollmentId, ReceivableId, PaymentId,
    CycleId, CareerId, AdmissionId,
};
pub use ports::{PortError, DomainPort, AdapterType};
pub use error::CoreError;
