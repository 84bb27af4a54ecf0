//! Tuition Ledger Domain
//!
//! This crate holds the ledger allocation engine for a training institute:
//! turning an enrollment into a schedule of receivables, applying payments
//! across a student's outstanding balances, and undoing payments or whole
//! enrollments without ever deleting history.
//!
//! # Components
//!
//! - **CodeGenerator**: assigns the unique human-readable student code
//! - **InstallmentPlanner**: turns enrollment costs into receivables
//! - **PaymentAllocator**: the payment waterfall
//! - **ReversalHandler**: payment cancellation and enrollment voiding
//! - **LedgerGuard**: balance and status-transition rules shared by all of the above
//!
//! Every operation runs inside one [`ports::LedgerTransaction`], so a failure
//! at any step leaves the store exactly as it was.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{LedgerService, PaymentRequest, PaymentMethod};
//!
//! let service = LedgerService::new(port, clock, settings)?;
//! let plan = service.create_enrollment_plan(request).await?;
//!
//! let payment = service.record_payment(PaymentRequest {
//!     receivable_id: plan.receivables[1].id,
//!     amount: dec!(150.00),
//!     method: PaymentMethod::Cash,
//!     notes: None,
//!     invoice_number: None,
//! }).await?;
//! ```

pub mod error;
pub mod receivable;
pub mod payment;
pub mod enrollment;
pub mod guard;
pub mod code;
pub mod planner;
pub mod allocator;
pub mod reversal;
pub mod ports;
pub mod settings;
pub mod service;
pub mod adapters;
mod validation;

pub use error::LedgerError;
pub use receivable::{Receivable, ReceivableStatus, ReceivableKind, NewReceivable, ReceivableUpdate};
pub use payment::{Payment, PaymentMethod, PaymentStatus, PaymentRequest, PaymentUpdate};
pub use enrollment::{Enrollment, EnrollmentPlanRequest, EnrollmentPlan, CostParams};
pub use guard::LedgerGuard;
pub use code::CodeGenerator;
pub use planner::{InstallmentPlanner, InstallmentPlan, PlannedPayment};
pub use allocator::{PaymentAllocator, Allocation, AllocationOutcome, Application};
pub use reversal::{ReversalHandler, VoidSummary};
pub use ports::{LedgerPort, LedgerTransaction, CodeAssignment, StudentRecord, CareerRecord, AdmissionRecord};
pub use settings::LedgerSettings;
pub use service::LedgerService;
pub use adapters::InMemoryLedger;
