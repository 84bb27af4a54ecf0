//! Ledger repository implementation
//!
//! All SQL the ledger runs lives here. Every query is written against a
//! generic [`PgExecutor`], so the same statement serves the pool (plain
//! reads) and an open transaction (locked reads and writes).
//!
//! # Locking
//!
//! The `*_for_update` queries take `FOR UPDATE` row locks and always order
//! by primary key, which keeps concurrent lockers from deadlocking.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use core_kernel::{
    AdmissionId, CareerId, CycleId, EnrollmentId, Money, PaymentId, ReceivableId, StudentId,
};
use domain_ledger::{
    AdmissionRecord, CareerRecord, CostParams, Enrollment, Payment, Receivable, StudentRecord,
};

use crate::error::DatabaseError;

const RECEIVABLE_COLUMNS: &str = "id, student_id, enrollment_id, kind, concept, total_amount, \
     pending_balance, status, due_date, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, receivable_id, amount_paid, method, status, invoice_number, \
     notes, payment_date, voided_at";

const ENROLLMENT_COLUMNS: &str = "id, student_id, cycle_id, career_id, admission_id, total_cost, \
     discounts, carnet_cost, credit, num_installments, initial_payment, payment_carnet, \
     code_student, notes, created_at, deleted_at";

/// Savepoint guarding the code update, so a lost race keeps the transaction alive
const CODE_SAVEPOINT: &str = "assign_code";

/// Repository for the tuition ledger tables
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Master data
    // ========================================================================

    pub async fn find_student<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<StudentRow>, DatabaseError> {
        let row = sqlx::query_as::<_, StudentRow>(
            "SELECT id, first_name, last_name FROM students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn cycle_exists<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM cycles WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(exists)
    }

    /// Finds a career together with the name of its area
    pub async fn find_career<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<CareerRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CareerRow>(
            r#"
            SELECT c.id, c.name, a.name AS area_name
            FROM careers c
            JOIN areas a ON a.id = c.area_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn find_admission<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<AdmissionRow>, DatabaseError> {
        let row = sqlx::query_as::<_, AdmissionRow>("SELECT id, name FROM admissions WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    // ========================================================================
    // Enrollments
    // ========================================================================

    pub async fn find_active_enrollment<'e>(
        executor: impl PgExecutor<'e>,
        student_id: Uuid,
        cycle_id: Uuid,
        career_id: Uuid,
        admission_id: Uuid,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM enrollments
            WHERE student_id = $1 AND cycle_id = $2 AND career_id = $3 AND admission_id = $4
              AND deleted_at IS NULL
            "#,
        )
        .bind(student_id)
        .bind(cycle_id)
        .bind(career_id)
        .bind(admission_id)
        .fetch_optional(executor)
        .await?;
        Ok(id)
    }

    pub async fn find_enrollment<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        lock: bool,
    ) -> Result<Option<EnrollmentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1{}",
            lock_clause(lock)
        );
        let row = sqlx::query_as::<_, EnrollmentRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn insert_enrollment<'e>(
        executor: impl PgExecutor<'e>,
        row: &EnrollmentRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, student_id, cycle_id, career_id, admission_id, total_cost,
                discounts, carnet_cost, credit, num_installments, initial_payment,
                payment_carnet, code_student, notes, created_at, deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(row.id)
        .bind(row.student_id)
        .bind(row.cycle_id)
        .bind(row.career_id)
        .bind(row.admission_id)
        .bind(row.total_cost)
        .bind(row.discounts)
        .bind(row.carnet_cost)
        .bind(row.credit)
        .bind(row.num_installments)
        .bind(row.initial_payment)
        .bind(row.payment_carnet)
        .bind(&row.code_student)
        .bind(&row.notes)
        .bind(row.created_at)
        .bind(row.deleted_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Writes back the mutable columns of an enrollment
    pub async fn update_enrollment<'e>(
        executor: impl PgExecutor<'e>,
        row: &EnrollmentRow,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE enrollments SET code_student = $2, notes = $3, deleted_at = $4 WHERE id = $1",
        )
        .bind(row.id)
        .bind(&row.code_student)
        .bind(&row.notes)
        .bind(row.deleted_at)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Enrollment", row.id));
        }
        Ok(())
    }

    pub async fn code_exists<'e>(executor: impl PgExecutor<'e>, code: &str) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE code_student = $1)",
        )
        .bind(code)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    /// Stores a student code on an enrollment
    ///
    /// Returns `Ok(false)` when the unique index rejects the code. The update
    /// runs inside a savepoint, so the surrounding transaction stays usable.
    pub async fn assign_code(
        conn: &mut sqlx::PgConnection,
        enrollment_id: Uuid,
        code: &str,
    ) -> Result<bool, DatabaseError> {
        sqlx::query(&format!("SAVEPOINT {CODE_SAVEPOINT}"))
            .execute(&mut *conn)
            .await?;

        let outcome = sqlx::query("UPDATE enrollments SET code_student = $2 WHERE id = $1")
            .bind(enrollment_id)
            .bind(code)
            .execute(&mut *conn)
            .await;

        match outcome {
            Ok(result) => {
                sqlx::query(&format!("RELEASE SAVEPOINT {CODE_SAVEPOINT}"))
                    .execute(&mut *conn)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DatabaseError::not_found("Enrollment", enrollment_id));
                }
                Ok(true)
            }
            Err(e) => {
                let error = DatabaseError::from(&e);
                sqlx::query(&format!("ROLLBACK TO SAVEPOINT {CODE_SAVEPOINT}"))
                    .execute(&mut *conn)
                    .await?;
                if error.is_unique_violation() {
                    Ok(false)
                } else {
                    Err(error)
                }
            }
        }
    }

    // ========================================================================
    // Receivables
    // ========================================================================

    pub async fn find_receivable<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        lock: bool,
    ) -> Result<Option<ReceivableRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE id = $1{}",
            lock_clause(lock)
        );
        let row = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Locks every receivable of a student in id order
    pub async fn lock_student_receivables<'e>(
        executor: impl PgExecutor<'e>,
        student_id: Uuid,
    ) -> Result<Vec<ReceivableRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE student_id = $1 ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(student_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Locks the receivables an enrollment generated, in id order
    pub async fn lock_enrollment_receivables<'e>(
        executor: impl PgExecutor<'e>,
        enrollment_id: Uuid,
    ) -> Result<Vec<ReceivableRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE enrollment_id = $1 ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(enrollment_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// All receivables of a student, latest due date first
    pub async fn list_student_receivables<'e>(
        executor: impl PgExecutor<'e>,
        student_id: Uuid,
    ) -> Result<Vec<ReceivableRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE student_id = $1 \
             ORDER BY due_date DESC, created_at DESC"
        );
        let rows = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(student_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Receivables of an enrollment, earliest due date first
    pub async fn list_enrollment_receivables<'e>(
        executor: impl PgExecutor<'e>,
        enrollment_id: Uuid,
    ) -> Result<Vec<ReceivableRow>, DatabaseError> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE enrollment_id = $1 \
             ORDER BY due_date ASC, created_at ASC"
        );
        let rows = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(enrollment_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Receivables of the enrollment holding a student code, earliest due
    /// date first
    pub async fn list_code_receivables<'e>(
        executor: impl PgExecutor<'e>,
        code: &str,
    ) -> Result<Vec<ReceivableRow>, DatabaseError> {
        let sql = r#"
            SELECT r.id, r.student_id, r.enrollment_id, r.kind, r.concept, r.total_amount,
                   r.pending_balance, r.status, r.due_date, r.created_at, r.updated_at
            FROM receivables r
            JOIN enrollments e ON e.id = r.enrollment_id
            WHERE e.code_student = $1
            ORDER BY r.due_date ASC, r.created_at ASC
            "#;
        let rows = sqlx::query_as::<_, ReceivableRow>(sql)
            .bind(code)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    pub async fn insert_receivable<'e>(
        executor: impl PgExecutor<'e>,
        row: &ReceivableRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO receivables (
                id, student_id, enrollment_id, kind, concept, total_amount,
                pending_balance, status, due_date, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.id)
        .bind(row.student_id)
        .bind(row.enrollment_id)
        .bind(&row.kind)
        .bind(&row.concept)
        .bind(row.total_amount)
        .bind(row.pending_balance)
        .bind(&row.status)
        .bind(row.due_date)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_receivable<'e>(
        executor: impl PgExecutor<'e>,
        row: &ReceivableRow,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE receivables
            SET concept = $2, total_amount = $3, pending_balance = $4, status = $5,
                due_date = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(row.id)
        .bind(&row.concept)
        .bind(row.total_amount)
        .bind(row.pending_balance)
        .bind(&row.status)
        .bind(row.due_date)
        .bind(row.updated_at)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Receivable", row.id));
        }
        Ok(())
    }

    // ========================================================================
    // Payments
    // ========================================================================

    pub async fn find_payment<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        lock: bool,
    ) -> Result<Option<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1{}",
            lock_clause(lock)
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Locks the payments made against any of the receivables, in id order
    pub async fn lock_payments_for_receivables<'e>(
        executor: impl PgExecutor<'e>,
        receivable_ids: &[Uuid],
    ) -> Result<Vec<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE receivable_id = ANY($1) ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(receivable_ids)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Payments against a receivable, latest first
    pub async fn list_receivable_payments<'e>(
        executor: impl PgExecutor<'e>,
        receivable_id: Uuid,
    ) -> Result<Vec<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE receivable_id = $1 ORDER BY payment_date DESC"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(receivable_id)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Payments against any receivable of a student, latest first
    pub async fn list_student_payments<'e>(
        executor: impl PgExecutor<'e>,
        student_id: Uuid,
    ) -> Result<Vec<PaymentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT p.id, p.receivable_id, p.amount_paid, p.method, p.status,
                   p.invoice_number, p.notes, p.payment_date, p.voided_at
            FROM payments p
            JOIN receivables r ON r.id = p.receivable_id
            WHERE r.student_id = $1
            ORDER BY p.payment_date DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn insert_payment<'e>(
        executor: impl PgExecutor<'e>,
        row: &PaymentRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, receivable_id, amount_paid, method, status,
                invoice_number, notes, payment_date, voided_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(row.id)
        .bind(row.receivable_id)
        .bind(row.amount_paid)
        .bind(&row.method)
        .bind(&row.status)
        .bind(&row.invoice_number)
        .bind(&row.notes)
        .bind(row.payment_date)
        .bind(row.voided_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Writes back the mutable columns; amount, method and receivable never
    /// change after insert
    pub async fn update_payment<'e>(
        executor: impl PgExecutor<'e>,
        row: &PaymentRow,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, voided_at = $3, invoice_number = $4, notes = $5 WHERE id = $1",
        )
            .bind(row.id)
            .bind(&row.status)
            .bind(row.voided_at)
            .bind(&row.invoice_number)
            .bind(&row.notes)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", row.id));
        }
        Ok(())
    }
}

fn lock_clause(lock: bool) -> &'static str {
    if lock {
        " FOR UPDATE"
    } else {
        ""
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Database row for students
#[derive(Debug, Clone, FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl From<StudentRow> for StudentRecord {
    fn from(row: StudentRow) -> Self {
        StudentRecord {
            id: StudentId::from_uuid(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

/// Database row for careers joined with their area
#[derive(Debug, Clone, FromRow)]
pub struct CareerRow {
    pub id: Uuid,
    pub name: String,
    pub area_name: String,
}

impl From<CareerRow> for CareerRecord {
    fn from(row: CareerRow) -> Self {
        CareerRecord {
            id: CareerId::from_uuid(row.id),
            name: row.name,
            area_name: row.area_name,
        }
    }
}

/// Database row for admissions
#[derive(Debug, Clone, FromRow)]
pub struct AdmissionRow {
    pub id: Uuid,
    pub name: String,
}

impl From<AdmissionRow> for AdmissionRecord {
    fn from(row: AdmissionRow) -> Self {
        AdmissionRecord {
            id: AdmissionId::from_uuid(row.id),
            name: row.name,
        }
    }
}

/// Database row for enrollments
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub cycle_id: Uuid,
    pub career_id: Uuid,
    pub admission_id: Uuid,
    pub total_cost: Decimal,
    pub discounts: Decimal,
    pub carnet_cost: Decimal,
    pub credit: bool,
    pub num_installments: i32,
    pub initial_payment: Decimal,
    pub payment_carnet: bool,
    pub code_student: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Enrollment> for EnrollmentRow {
    fn from(enrollment: &Enrollment) -> Self {
        let costs = &enrollment.costs;
        EnrollmentRow {
            id: *enrollment.id.as_uuid(),
            student_id: *enrollment.student_id.as_uuid(),
            cycle_id: *enrollment.cycle_id.as_uuid(),
            career_id: *enrollment.career_id.as_uuid(),
            admission_id: *enrollment.admission_id.as_uuid(),
            total_cost: costs.total_cost.amount(),
            discounts: costs.discounts.amount(),
            carnet_cost: costs.carnet_cost.amount(),
            credit: costs.credit,
            num_installments: i32::try_from(costs.num_installments).unwrap_or(i32::MAX),
            initial_payment: costs.initial_payment.amount(),
            payment_carnet: costs.payment_carnet,
            code_student: enrollment.code_student.clone(),
            notes: enrollment.notes.clone(),
            created_at: enrollment.created_at,
            deleted_at: enrollment.deleted_at,
        }
    }
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = DatabaseError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        let num_installments = u32::try_from(row.num_installments)
            .map_err(|_| DatabaseError::corrupt("enrollments", format!("num_installments {}", row.num_installments)))?;

        Ok(Enrollment {
            id: EnrollmentId::from_uuid(row.id),
            student_id: StudentId::from_uuid(row.student_id),
            cycle_id: CycleId::from_uuid(row.cycle_id),
            career_id: CareerId::from_uuid(row.career_id),
            admission_id: AdmissionId::from_uuid(row.admission_id),
            costs: CostParams {
                total_cost: stored_money("enrollments", row.total_cost)?,
                discounts: stored_money("enrollments", row.discounts)?,
                carnet_cost: stored_money("enrollments", row.carnet_cost)?,
                credit: row.credit,
                num_installments,
                initial_payment: stored_money("enrollments", row.initial_payment)?,
                payment_carnet: row.payment_carnet,
            },
            code_student: row.code_student,
            notes: row.notes,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Database row for receivables
#[derive(Debug, Clone, FromRow)]
pub struct ReceivableRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub enrollment_id: Option<Uuid>,
    pub kind: String,
    pub concept: String,
    pub total_amount: Decimal,
    pub pending_balance: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Receivable> for ReceivableRow {
    fn from(receivable: &Receivable) -> Self {
        ReceivableRow {
            id: *receivable.id.as_uuid(),
            student_id: *receivable.student_id.as_uuid(),
            enrollment_id: receivable.enrollment_id.map(|id| *id.as_uuid()),
            kind: receivable.kind.as_str().to_string(),
            concept: receivable.concept.clone(),
            total_amount: receivable.total_amount.amount(),
            pending_balance: receivable.pending_balance.amount(),
            status: receivable.status.as_str().to_string(),
            due_date: receivable.due_date,
            created_at: receivable.created_at,
            updated_at: receivable.updated_at,
        }
    }
}

impl TryFrom<ReceivableRow> for Receivable {
    type Error = DatabaseError;

    fn try_from(row: ReceivableRow) -> Result<Self, Self::Error> {
        Ok(Receivable {
            id: ReceivableId::from_uuid(row.id),
            student_id: StudentId::from_uuid(row.student_id),
            enrollment_id: row.enrollment_id.map(EnrollmentId::from_uuid),
            kind: row.kind.parse().map_err(|e| DatabaseError::corrupt("receivables", e))?,
            concept: row.concept,
            total_amount: stored_money("receivables", row.total_amount)?,
            pending_balance: stored_money("receivables", row.pending_balance)?,
            status: row.status.parse().map_err(|e| DatabaseError::corrupt("receivables", e))?,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row for payments
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub receivable_id: Uuid,
    pub amount_paid: Decimal,
    pub method: String,
    pub status: String,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentRow {
    fn from(payment: &Payment) -> Self {
        PaymentRow {
            id: *payment.id.as_uuid(),
            receivable_id: *payment.receivable_id.as_uuid(),
            amount_paid: payment.amount_paid.amount(),
            method: payment.method.as_str().to_string(),
            status: payment.status.as_str().to_string(),
            invoice_number: payment.invoice_number.clone(),
            notes: payment.notes.clone(),
            payment_date: payment.payment_date,
            voided_at: payment.voided_at,
        }
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            receivable_id: ReceivableId::from_uuid(row.receivable_id),
            amount_paid: stored_money("payments", row.amount_paid)?,
            method: row.method.parse().map_err(|e| DatabaseError::corrupt("payments", e))?,
            status: row.status.parse().map_err(|e| DatabaseError::corrupt("payments", e))?,
            invoice_number: row.invoice_number,
            notes: row.notes,
            payment_date: row.payment_date,
            voided_at: row.voided_at,
        })
    }
}

/// NUMERIC(12,2) columns always fit; anything else is a corrupt row
fn stored_money(table: &'static str, amount: Decimal) -> Result<Money, DatabaseError> {
    Money::try_new(amount).map_err(|e| DatabaseError::corrupt(table, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain_ledger::{PaymentMethod, ReceivableKind, ReceivableStatus};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn receivable() -> Receivable {
        Receivable::new(
            StudentId::new(),
            ReceivableKind::Tuition,
            "Tuition - Installment 1/3 - 2025-I-Engineering-JUPE-001",
            Money::new(dec!(333.33)),
            NaiveDate::from_ymd_opt(2025, 1, 30).unwrap(),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_receivable_row_uses_stored_spellings() {
        let row = ReceivableRow::from(&receivable());
        assert_eq!(row.kind, "TUITION");
        assert_eq!(row.status, "PENDING");
        assert_eq!(row.pending_balance, dec!(333.33));
    }

    #[test]
    fn test_receivable_row_maps_back() {
        let original = receivable();
        let restored = Receivable::try_from(ReceivableRow::from(&original)).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_unknown_status_is_corrupt_row() {
        let mut row = ReceivableRow::from(&receivable());
        row.status = "LOST".to_string();

        let error = Receivable::try_from(row).unwrap_err();
        assert!(matches!(error, DatabaseError::CorruptRow { table: "receivables", .. }));
    }

    #[test]
    fn test_sub_cent_amount_is_corrupt_row() {
        let mut row = PaymentRow::from(&Payment::new(
            ReceivableId::new(),
            Money::new(dec!(10)),
            PaymentMethod::BankTransfer,
            now(),
        ));
        assert_eq!(row.method, "BANK_TRANSFER");
        row.amount_paid = dec!(10.005);

        assert!(Payment::try_from(row).is_err());
    }

    #[test]
    fn test_void_status_round_trips_through_text() {
        let mut r = receivable();
        r.void(now()).unwrap();
        let restored = Receivable::try_from(ReceivableRow::from(&r)).unwrap();
        assert_eq!(restored.status, ReceivableStatus::Void);
    }

    #[test]
    fn test_lock_clause() {
        assert_eq!(lock_clause(true), " FOR UPDATE");
        assert_eq!(lock_clause(false), "");
    }
}
