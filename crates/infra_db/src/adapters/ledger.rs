//! PostgreSQL Ledger Adapter
//!
//! Implements [`LedgerPort`] on top of [`LedgerRepository`]. Each
//! [`LedgerPort::begin`] opens a real database transaction; the locked reads
//! issued through it hold their row locks until commit or rollback.
//!
//! # Error Handling
//!
//! Database errors are translated to `PortError` variants:
//! - `DatabaseError::NotFound` -> `PortError::NotFound`
//! - `DatabaseError::DuplicateEntry` -> `PortError::Conflict`
//! - Other errors -> `PortError::Internal`

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    AdapterType, AdmissionId, CareerId, CycleId, DomainPort, EnrollmentId, PaymentId,
    PortError, ReceivableId, StudentId,
};
use domain_ledger::{
    AdmissionRecord, CareerRecord, CodeAssignment, Enrollment, LedgerPort, LedgerTransaction,
    Payment, Receivable, StudentRecord,
};

use crate::error::DatabaseError;
use crate::repositories::ledger::{EnrollmentRow, LedgerRepository, PaymentRow, ReceivableRow};

/// PostgreSQL-backed implementation of the LedgerPort trait
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    repository: LedgerRepository,
}

impl PostgresLedgerAdapter {
    /// Creates a new PostgreSQL ledger adapter
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: LedgerRepository::new(pool),
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &LedgerRepository {
        &self.repository
    }

    fn pool(&self) -> &PgPool {
        self.repository.pool()
    }
}

impl DomainPort for PostgresLedgerAdapter {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Internal
    }
}

#[async_trait]
impl LedgerPort for PostgresLedgerAdapter {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, PortError> {
        let tx = self.pool().begin().await.map_err(DatabaseError::from)?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    #[instrument(skip(self), fields(receivable_id = %id))]
    async fn receivable(&self, id: ReceivableId) -> Result<Option<Receivable>, PortError> {
        let row = LedgerRepository::find_receivable(self.pool(), *id.as_uuid(), false).await?;
        Ok(row.map(Receivable::try_from).transpose()?)
    }

    #[instrument(skip(self), fields(student_id = %student_id))]
    async fn receivables_for_student(&self, student_id: StudentId) -> Result<Vec<Receivable>, PortError> {
        let rows = LedgerRepository::list_student_receivables(self.pool(), *student_id.as_uuid()).await?;
        debug!(count = rows.len(), "Fetched student receivables");
        to_domain(rows)
    }

    #[instrument(skip(self), fields(enrollment_id = %enrollment_id))]
    async fn receivables_for_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Vec<Receivable>, PortError> {
        let rows = LedgerRepository::list_enrollment_receivables(self.pool(), *enrollment_id.as_uuid()).await?;
        to_domain(rows)
    }

    #[instrument(skip(self))]
    async fn receivables_for_code(&self, code: &str) -> Result<Vec<Receivable>, PortError> {
        let rows = LedgerRepository::list_code_receivables(self.pool(), code).await?;
        to_domain(rows)
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        let row = LedgerRepository::find_payment(self.pool(), *id.as_uuid(), false).await?;
        Ok(row.map(Payment::try_from).transpose()?)
    }

    #[instrument(skip(self), fields(receivable_id = %receivable_id))]
    async fn payments_for_receivable(&self, receivable_id: ReceivableId) -> Result<Vec<Payment>, PortError> {
        let rows = LedgerRepository::list_receivable_payments(self.pool(), *receivable_id.as_uuid()).await?;
        to_domain(rows)
    }

    #[instrument(skip(self), fields(student_id = %student_id))]
    async fn payments_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>, PortError> {
        let rows = LedgerRepository::list_student_payments(self.pool(), *student_id.as_uuid()).await?;
        to_domain(rows)
    }

    #[instrument(skip(self), fields(enrollment_id = %id))]
    async fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, PortError> {
        let row = LedgerRepository::find_enrollment(self.pool(), *id.as_uuid(), false).await?;
        Ok(row.map(Enrollment::try_from).transpose()?)
    }
}

/// A ledger unit of work backed by a PostgreSQL transaction
///
/// Dropping it without committing rolls the transaction back.
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn student(&mut self, id: StudentId) -> Result<Option<StudentRecord>, PortError> {
        let row = LedgerRepository::find_student(&mut *self.tx, *id.as_uuid()).await?;
        Ok(row.map(StudentRecord::from))
    }

    async fn cycle_exists(&mut self, id: CycleId) -> Result<bool, PortError> {
        Ok(LedgerRepository::cycle_exists(&mut *self.tx, *id.as_uuid()).await?)
    }

    async fn career(&mut self, id: CareerId) -> Result<Option<CareerRecord>, PortError> {
        let row = LedgerRepository::find_career(&mut *self.tx, *id.as_uuid()).await?;
        Ok(row.map(CareerRecord::from))
    }

    async fn admission(&mut self, id: AdmissionId) -> Result<Option<AdmissionRecord>, PortError> {
        let row = LedgerRepository::find_admission(&mut *self.tx, *id.as_uuid()).await?;
        Ok(row.map(AdmissionRecord::from))
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        cycle_id: CycleId,
        career_id: CareerId,
        admission_id: AdmissionId,
    ) -> Result<Option<EnrollmentId>, PortError> {
        let id = LedgerRepository::find_active_enrollment(
            &mut *self.tx,
            *student_id.as_uuid(),
            *cycle_id.as_uuid(),
            *career_id.as_uuid(),
            *admission_id.as_uuid(),
        )
        .await?;
        Ok(id.map(EnrollmentId::from_uuid))
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError> {
        LedgerRepository::insert_enrollment(&mut *self.tx, &EnrollmentRow::from(enrollment)).await?;
        Ok(())
    }

    async fn enrollment_for_update(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>, PortError> {
        let row = LedgerRepository::find_enrollment(&mut *self.tx, *id.as_uuid(), true).await?;
        Ok(row.map(Enrollment::try_from).transpose()?)
    }

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError> {
        LedgerRepository::update_enrollment(&mut *self.tx, &EnrollmentRow::from(enrollment)).await?;
        Ok(())
    }

    async fn code_exists(&mut self, code: &str) -> Result<bool, PortError> {
        Ok(LedgerRepository::code_exists(&mut *self.tx, code).await?)
    }

    async fn assign_code(&mut self, enrollment_id: EnrollmentId, code: &str) -> Result<CodeAssignment, PortError> {
        if LedgerRepository::assign_code(&mut *self.tx, *enrollment_id.as_uuid(), code).await? {
            Ok(CodeAssignment::Assigned)
        } else {
            debug!(code, "Code claimed by a concurrent enrollment");
            Ok(CodeAssignment::Taken)
        }
    }

    async fn insert_receivable(&mut self, receivable: &Receivable) -> Result<(), PortError> {
        LedgerRepository::insert_receivable(&mut *self.tx, &ReceivableRow::from(receivable)).await?;
        Ok(())
    }

    async fn receivable(&mut self, id: ReceivableId) -> Result<Option<Receivable>, PortError> {
        let row = LedgerRepository::find_receivable(&mut *self.tx, *id.as_uuid(), false).await?;
        Ok(row.map(Receivable::try_from).transpose()?)
    }

    async fn receivable_for_update(&mut self, id: ReceivableId) -> Result<Option<Receivable>, PortError> {
        let row = LedgerRepository::find_receivable(&mut *self.tx, *id.as_uuid(), true).await?;
        Ok(row.map(Receivable::try_from).transpose()?)
    }

    async fn lock_student_receivables(&mut self, student_id: StudentId) -> Result<Vec<Receivable>, PortError> {
        let rows = LedgerRepository::lock_student_receivables(&mut *self.tx, *student_id.as_uuid()).await?;
        to_domain(rows)
    }

    async fn receivables_for_enrollment_for_update(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<Receivable>, PortError> {
        let rows =
            LedgerRepository::lock_enrollment_receivables(&mut *self.tx, *enrollment_id.as_uuid()).await?;
        to_domain(rows)
    }

    async fn save_receivable(&mut self, receivable: &Receivable) -> Result<(), PortError> {
        LedgerRepository::update_receivable(&mut *self.tx, &ReceivableRow::from(receivable)).await?;
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        LedgerRepository::insert_payment(&mut *self.tx, &PaymentRow::from(payment)).await?;
        Ok(())
    }

    async fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        let row = LedgerRepository::find_payment(&mut *self.tx, *id.as_uuid(), false).await?;
        Ok(row.map(Payment::try_from).transpose()?)
    }

    async fn payment_for_update(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        let row = LedgerRepository::find_payment(&mut *self.tx, *id.as_uuid(), true).await?;
        Ok(row.map(Payment::try_from).transpose()?)
    }

    async fn payments_for_receivables_for_update(
        &mut self,
        receivable_ids: &[ReceivableId],
    ) -> Result<Vec<Payment>, PortError> {
        let ids: Vec<Uuid> = receivable_ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = LedgerRepository::lock_payments_for_receivables(&mut *self.tx, &ids).await?;
        to_domain(rows)
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        LedgerRepository::update_payment(&mut *self.tx, &PaymentRow::from(payment)).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        if let Err(e) = self.tx.rollback().await {
            warn!(error = %e, "Rollback failed; the connection will discard the transaction");
            return Err(DatabaseError::from(e).into());
        }
        Ok(())
    }
}

/// Maps stored rows to domain values, failing on the first corrupt row
fn to_domain<R, T>(rows: Vec<R>) -> Result<Vec<T>, PortError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(PortError::from))
        .collect()
}
