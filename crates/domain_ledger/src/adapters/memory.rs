//! In-memory ledger store
//!
//! Transactions take the store's async mutex for their whole lifetime and
//! work on a private copy of the state, which replaces the shared state on
//! commit. Writers are therefore fully serialized and a rollback (or a
//! dropped transaction) leaves no trace.
//!
//! Besides seeding master data, the store can inject two faults that are
//! hard to provoke otherwise: a code claimed by a concurrent writer between
//! probe and insert, and a failing payment insert.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    AdapterType, AdmissionId, CareerId, CycleId, DomainPort, EnrollmentId, PaymentId,
    PortError, ReceivableId, StudentId,
};

use crate::enrollment::Enrollment;
use crate::payment::Payment;
use crate::ports::{
    AdmissionRecord, CareerRecord, CodeAssignment, LedgerPort, LedgerTransaction, StudentRecord,
};
use crate::receivable::Receivable;

#[derive(Debug, Clone, Default)]
struct LedgerState {
    students: HashMap<StudentId, StudentRecord>,
    cycles: HashSet<CycleId>,
    careers: HashMap<CareerId, CareerRecord>,
    admissions: HashMap<AdmissionId, AdmissionRecord>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    /// Codes held by writers outside this store's enrollments
    foreign_codes: HashSet<String>,
    receivables: BTreeMap<ReceivableId, Receivable>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl LedgerState {
    fn code_taken(&self, code: &str) -> bool {
        self.foreign_codes.contains(code)
            || self
                .enrollments
                .values()
                .any(|e| e.code_student.as_deref() == Some(code))
    }

    fn student_receivable_ids(&self, student_id: StudentId) -> HashSet<ReceivableId> {
        self.receivables
            .values()
            .filter(|r| r.student_id == student_id)
            .map(|r| r.id)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    code_races: HashSet<String>,
    failing_payment_inserts: usize,
}

/// Ledger store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    pub async fn add_student(&self, first_name: &str, last_name: &str) -> StudentId {
        let id = StudentId::new();
        self.state.lock().await.students.insert(id, StudentRecord {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        });
        id
    }

    pub async fn add_cycle(&self) -> CycleId {
        let id = CycleId::new();
        self.state.lock().await.cycles.insert(id);
        id
    }

    pub async fn add_career(&self, name: &str, area_name: &str) -> CareerId {
        let id = CareerId::new();
        self.state.lock().await.careers.insert(id, CareerRecord {
            id,
            name: name.to_string(),
            area_name: area_name.to_string(),
        });
        id
    }

    pub async fn add_admission(&self, name: &str) -> AdmissionId {
        let id = AdmissionId::new();
        self.state.lock().await.admissions.insert(id, AdmissionRecord {
            id,
            name: name.to_string(),
        });
        id
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// Makes the next claim of `code` lose to a concurrent writer
    ///
    /// The probe still reports the code as free; the claim then finds it
    /// taken, exactly as when another transaction commits in between.
    pub async fn race_for_code(&self, code: impl Into<String>) {
        self.faults.lock().await.code_races.insert(code.into());
    }

    /// Makes the next payment insert fail with an internal error
    pub async fn fail_next_payment_insert(&self) {
        self.faults.lock().await.failing_payment_inserts += 1;
    }
}

impl DomainPort for InMemoryLedger {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Mock
    }
}

#[async_trait]
impl LedgerPort for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, PortError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }

    async fn receivable(&self, id: ReceivableId) -> Result<Option<Receivable>, PortError> {
        Ok(self.state.lock().await.receivables.get(&id).cloned())
    }

    async fn receivables_for_student(&self, student_id: StudentId) -> Result<Vec<Receivable>, PortError> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .receivables
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.due_date.cmp(&a.due_date).then(b.created_at.cmp(&a.created_at)));
        Ok(rows)
    }

    async fn receivables_for_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Vec<Receivable>, PortError> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .receivables
            .values()
            .filter(|r| r.enrollment_id == Some(enrollment_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.created_at.cmp(&b.created_at)));
        Ok(rows)
    }

    async fn receivables_for_code(&self, code: &str) -> Result<Vec<Receivable>, PortError> {
        let enrollment_id = {
            let state = self.state.lock().await;
            state
                .enrollments
                .values()
                .find(|e| e.code_student.as_deref() == Some(code))
                .map(|e| e.id)
        };
        match enrollment_id {
            Some(id) => self.receivables_for_enrollment(id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.state.lock().await.payments.get(&id).cloned())
    }

    async fn payments_for_receivable(&self, receivable_id: ReceivableId) -> Result<Vec<Payment>, PortError> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .payments
            .values()
            .filter(|p| p.receivable_id == receivable_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(rows)
    }

    async fn payments_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>, PortError> {
        let state = self.state.lock().await;
        let owned = state.student_receivable_ids(student_id);
        let mut rows: Vec<_> = state
            .payments
            .values()
            .filter(|p| owned.contains(&p.receivable_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(rows)
    }

    async fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, PortError> {
        Ok(self.state.lock().await.enrollments.get(&id).cloned())
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
    faults: Arc<Mutex<Faults>>,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn student(&mut self, id: StudentId) -> Result<Option<StudentRecord>, PortError> {
        Ok(self.working.students.get(&id).cloned())
    }

    async fn cycle_exists(&mut self, id: CycleId) -> Result<bool, PortError> {
        Ok(self.working.cycles.contains(&id))
    }

    async fn career(&mut self, id: CareerId) -> Result<Option<CareerRecord>, PortError> {
        Ok(self.working.careers.get(&id).cloned())
    }

    async fn admission(&mut self, id: AdmissionId) -> Result<Option<AdmissionRecord>, PortError> {
        Ok(self.working.admissions.get(&id).cloned())
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        cycle_id: CycleId,
        career_id: CareerId,
        admission_id: AdmissionId,
    ) -> Result<Option<EnrollmentId>, PortError> {
        Ok(self
            .working
            .enrollments
            .values()
            .find(|e| {
                !e.is_deleted()
                    && e.student_id == student_id
                    && e.cycle_id == cycle_id
                    && e.career_id == career_id
                    && e.admission_id == admission_id
            })
            .map(|e| e.id))
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError> {
        if self.working.enrollments.contains_key(&enrollment.id) {
            return Err(PortError::conflict(enrollment.id.to_string(), "enrollment already exists"));
        }
        self.working.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn enrollment_for_update(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>, PortError> {
        Ok(self.working.enrollments.get(&id).cloned())
    }

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), PortError> {
        let row = self
            .working
            .enrollments
            .get_mut(&enrollment.id)
            .ok_or_else(|| PortError::not_found("Enrollment", enrollment.id))?;
        *row = enrollment.clone();
        Ok(())
    }

    async fn code_exists(&mut self, code: &str) -> Result<bool, PortError> {
        Ok(self.working.code_taken(code))
    }

    async fn assign_code(&mut self, enrollment_id: EnrollmentId, code: &str) -> Result<CodeAssignment, PortError> {
        if self.faults.lock().await.code_races.remove(code) {
            // The concurrent writer has committed: the code is gone for good
            self.guard.foreign_codes.insert(code.to_string());
            self.working.foreign_codes.insert(code.to_string());
            return Ok(CodeAssignment::Taken);
        }
        if self.working.code_taken(code) {
            return Ok(CodeAssignment::Taken);
        }

        let enrollment = self
            .working
            .enrollments
            .get_mut(&enrollment_id)
            .ok_or_else(|| PortError::not_found("Enrollment", enrollment_id))?;
        enrollment.code_student = Some(code.to_string());
        Ok(CodeAssignment::Assigned)
    }

    async fn insert_receivable(&mut self, receivable: &Receivable) -> Result<(), PortError> {
        if self.working.receivables.contains_key(&receivable.id) {
            return Err(PortError::conflict(receivable.id.to_string(), "receivable already exists"));
        }
        self.working.receivables.insert(receivable.id, receivable.clone());
        Ok(())
    }

    async fn receivable(&mut self, id: ReceivableId) -> Result<Option<Receivable>, PortError> {
        Ok(self.working.receivables.get(&id).cloned())
    }

    async fn receivable_for_update(&mut self, id: ReceivableId) -> Result<Option<Receivable>, PortError> {
        Ok(self.working.receivables.get(&id).cloned())
    }

    async fn lock_student_receivables(&mut self, student_id: StudentId) -> Result<Vec<Receivable>, PortError> {
        Ok(self
            .working
            .receivables
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn receivables_for_enrollment_for_update(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<Receivable>, PortError> {
        Ok(self
            .working
            .receivables
            .values()
            .filter(|r| r.enrollment_id == Some(enrollment_id))
            .cloned()
            .collect())
    }

    async fn save_receivable(&mut self, receivable: &Receivable) -> Result<(), PortError> {
        let row = self
            .working
            .receivables
            .get_mut(&receivable.id)
            .ok_or_else(|| PortError::not_found("Receivable", receivable.id))?;
        *row = receivable.clone();
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        {
            let mut faults = self.faults.lock().await;
            if faults.failing_payment_inserts > 0 {
                faults.failing_payment_inserts -= 1;
                return Err(PortError::internal("injected payment insert failure"));
            }
        }
        if !self.working.receivables.contains_key(&payment.receivable_id) {
            return Err(PortError::not_found("Receivable", payment.receivable_id));
        }
        if self.working.payments.contains_key(&payment.id) {
            return Err(PortError::conflict(payment.id.to_string(), "payment already exists"));
        }
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn payment_for_update(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn payments_for_receivables_for_update(
        &mut self,
        receivable_ids: &[ReceivableId],
    ) -> Result<Vec<Payment>, PortError> {
        Ok(self
            .working
            .payments
            .values()
            .filter(|p| receivable_ids.contains(&p.receivable_id))
            .cloned()
            .collect())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        let row = self
            .working
            .payments
            .get_mut(&payment.id)
            .ok_or_else(|| PortError::not_found("Payment", payment.id))?;
        *row = payment.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let InMemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use core_kernel::Money;
    use rust_decimal_macros::dec;

    use crate::receivable::ReceivableKind;

    fn receivable(student_id: StudentId) -> Receivable {
        Receivable::new(
            student_id,
            ReceivableKind::Manual,
            "Lab fee",
            Money::new(dec!(25)),
            NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryLedger::new();
        let student = store.add_student("Ana", "Lopez").await;
        let r = receivable(student);

        let mut tx = store.begin().await.unwrap();
        tx.insert_receivable(&r).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.receivable(r.id).await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryLedger::new();
        let student = store.add_student("Ana", "Lopez").await;
        let r = receivable(student);

        let mut tx = store.begin().await.unwrap();
        tx.insert_receivable(&r).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.receivable(r.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryLedger::new();
        let student = store.add_student("Ana", "Lopez").await;
        let r = receivable(student);

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_receivable(&r).await.unwrap();
        }

        assert!(store.receivables_for_student(student).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_race_survives_rollback() {
        let store = InMemoryLedger::new();
        store.race_for_code("A-B-CCDD-001").await;

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.code_exists("A-B-CCDD-001").await.unwrap());
        let outcome = tx.assign_code(EnrollmentId::new(), "A-B-CCDD-001").await.unwrap();
        assert_eq!(outcome, CodeAssignment::Taken);
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.code_exists("A-B-CCDD-001").await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_payment_failure_fires_once() {
        let store = InMemoryLedger::new();
        let student = store.add_student("Ana", "Lopez").await;
        let r = receivable(student);
        store.fail_next_payment_insert().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_receivable(&r).await.unwrap();
        let payment = Payment::new(r.id, Money::new(dec!(5)), crate::payment::PaymentMethod::Cash, Utc::now());
        assert!(tx.insert_payment(&payment).await.is_err());
        assert!(tx.insert_payment(&payment).await.is_ok());
    }

    #[test]
    fn test_adapter_type() {
        assert_eq!(InMemoryLedger::new().adapter_type(), AdapterType::Mock);
    }
}
