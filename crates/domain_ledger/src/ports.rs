//! Ledger Domain Ports
//!
//! The engine reaches its store only through these traits. `LedgerPort`
//! opens transactions and serves read-only queries; `LedgerTransaction` is
//! the unit of work every mutating operation runs inside.
//!
//! # Locking contract
//!
//! Methods suffixed `_for_update` (and `lock_student_receivables`) must hold
//! the returned rows until commit or rollback. Adapters lock receivables
//! before payments, and a student's receivables in id order, so two
//! concurrent operations can never wait on each other in a cycle.
//!
//! # Adapters
//!
//! - **In-memory** ([`crate::adapters::InMemoryLedger`]): one writer at a time
//! - **PostgreSQL** (`infra_db::PostgresLedgerAdapter`): row locks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{
    AdmissionId, CareerId, CycleId, DomainPort, EnrollmentId, PaymentId, PortError,
    ReceivableId, StudentId,
};

use crate::enrollment::Enrollment;
use crate::payment::Payment;
use crate::receivable::Receivable;

/// Student master data the ledger needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
}

/// Career with the name of the area it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerRecord {
    pub id: CareerId,
    pub name: String,
    pub area_name: String,
}

/// Admission process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub id: AdmissionId,
    pub name: String,
}

/// Result of trying to claim a student code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeAssignment {
    /// The code now belongs to the enrollment
    Assigned,
    /// Another enrollment holds the code; the transaction is still usable
    Taken,
}

/// A unit of work against the ledger store
///
/// Nothing written through a transaction is visible to others until
/// [`commit`](LedgerTransaction::commit). Dropping a transaction without
/// committing discards its writes.
#[async_trait]
pub trait LedgerTransaction: Send {
    // ========================================================================
    // Master data
    // ========================================================================

    async fn student(&mut self, id: StudentId) -> Result<Option<StudentRecord>, PortError>;

    async fn cycle_exists(&mut self, id: CycleId) -> Result<bool, PortError>;

    async fn career(&mut self, id: CareerId) -> Result<Option<CareerRecord>, PortError>;

    async fn admission(&mut self, id: AdmissionId) -> Result<Option<AdmissionRecord>, PortError>;

    // ========================================================================
    // Enrollments and codes
    // ========================================================================

    /// Finds a live enrollment for the same student, cycle, career and admission
    async fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        cycle_id: CycleId,
        career_id: CareerId,
        admission_id: AdmissionId,
    ) -> Result<Option<EnrollmentId>, PortError>;

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError>;

    async fn enrollment_for_update(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>, PortError>;

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError>;

    /// Returns true if any enrollment already holds `code`
    async fn code_exists(&mut self, code: &str) -> Result<bool, PortError>;

    /// Stores `code` on the enrollment
    ///
    /// A uniqueness violation caused by a concurrent writer is reported as
    /// [`CodeAssignment::Taken`] rather than as an error, and must leave the
    /// transaction usable.
    async fn assign_code(&mut self, enrollment_id: EnrollmentId, code: &str) -> Result<CodeAssignment, PortError>;

    // ========================================================================
    // Receivables
    // ========================================================================

    async fn insert_receivable(&mut self, receivable: &Receivable) -> Result<(), PortError>;

    /// Reads a receivable without locking it
    async fn receivable(&mut self, id: ReceivableId) -> Result<Option<Receivable>, PortError>;

    async fn receivable_for_update(&mut self, id: ReceivableId) -> Result<Option<Receivable>, PortError>;

    /// Locks every receivable of the student, in id order, and returns them
    async fn lock_student_receivables(&mut self, student_id: StudentId) -> Result<Vec<Receivable>, PortError>;

    /// Locks the receivables generated by an enrollment, in id order
    async fn receivables_for_enrollment_for_update(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<Receivable>, PortError>;

    async fn save_receivable(&mut self, receivable: &Receivable) -> Result<(), PortError>;

    // ========================================================================
    // Payments
    // ========================================================================

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    /// Reads a payment without locking it
    async fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError>;

    async fn payment_for_update(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError>;

    /// Locks the payments made against any of the given receivables
    async fn payments_for_receivables_for_update(
        &mut self,
        receivable_ids: &[ReceivableId],
    ) -> Result<Vec<Payment>, PortError>;

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    // ========================================================================
    // Completion
    // ========================================================================

    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}

/// The port the ledger service is built on
#[async_trait]
pub trait LedgerPort: DomainPort {
    /// Opens a new transaction
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, PortError>;

    async fn receivable(&self, id: ReceivableId) -> Result<Option<Receivable>, PortError>;

    /// All receivables of a student, latest due date first
    async fn receivables_for_student(&self, student_id: StudentId) -> Result<Vec<Receivable>, PortError>;

    /// Receivables generated by an enrollment, earliest due date first
    async fn receivables_for_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Vec<Receivable>, PortError>;

    /// Receivables generated by the enrollment holding a student code,
    /// earliest due date first; empty when no enrollment holds it
    async fn receivables_for_code(&self, code: &str) -> Result<Vec<Receivable>, PortError>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, PortError>;

    /// Payments against a receivable, latest first
    async fn payments_for_receivable(&self, receivable_id: ReceivableId) -> Result<Vec<Payment>, PortError>;

    /// Payments against any of a student's receivables, latest first
    async fn payments_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>, PortError>;

    async fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, PortError>;
}
