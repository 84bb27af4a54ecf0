//! Ledger application service
//!
//! `LedgerService` is the entry point callers use. Each mutating method opens
//! one transaction, runs the components against it and commits; any error
//! rolls the whole transaction back before it is returned.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use core_kernel::{Clock, CoreError, EnrollmentId, Money, PaymentId, ReceivableId, StudentId};

use crate::allocator::{AllocationOutcome, PaymentAllocator};
use crate::code::CodeGenerator;
use crate::enrollment::{CostParams, EnrollmentPlan, EnrollmentPlanRequest};
use crate::error::LedgerError;
use crate::payment::{Payment, PaymentRequest, PaymentUpdate};
use crate::planner::InstallmentPlanner;
use crate::ports::{LedgerPort, LedgerTransaction};
use crate::receivable::{NewReceivable, Receivable, ReceivableKind, ReceivableUpdate};
use crate::reversal::{ReversalHandler, VoidSummary};
use crate::settings::LedgerSettings;

/// Tuition ledger operations
pub struct LedgerService {
    port: Arc<dyn LedgerPort>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl LedgerService {
    /// Creates a service over a port
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the settings are out of range.
    pub fn new(
        port: Arc<dyn LedgerPort>,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        Ok(Self { port, clock, settings })
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    // ========================================================================
    // Enrollment
    // ========================================================================

    /// Creates an enrollment, assigns its student code, generates its
    /// receivables and records any carnet or initial payment
    #[instrument(skip(self, request), fields(student_id = %request.student_id, cycle_id = %request.cycle_id))]
    pub async fn create_enrollment_plan(
        &self,
        request: EnrollmentPlanRequest,
    ) -> Result<EnrollmentPlan, LedgerError> {
        let costs = request.cost_params()?;
        let mut tx = self.port.begin().await?;
        let result = self.create_plan_in(tx.as_mut(), &request, costs).await;
        finish(tx, result).await
    }

    /// Voids every receivable and payment of an enrollment and marks it
    /// deleted
    #[instrument(skip(self), fields(enrollment_id = %enrollment_id))]
    pub async fn void_enrollment_ledger(&self, enrollment_id: EnrollmentId) -> Result<VoidSummary, LedgerError> {
        let mut tx = self.port.begin().await?;
        let result = ReversalHandler::void_enrollment(tx.as_mut(), enrollment_id, self.clock.now()).await;
        finish(tx, result).await
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Records a payment, spreading any excess over the student's other
    /// pending receivables
    #[instrument(skip(self, request), fields(receivable_id = %request.receivable_id))]
    pub async fn record_payment(&self, request: PaymentRequest) -> Result<Payment, LedgerError> {
        Ok(self.record_payment_detailed(request).await?.payment)
    }

    /// Like [`record_payment`](Self::record_payment), also returning the
    /// per-receivable breakdown
    pub async fn record_payment_detailed(&self, request: PaymentRequest) -> Result<AllocationOutcome, LedgerError> {
        let allocation = request.into_allocation()?;
        let mut tx = self.port.begin().await?;
        let result = PaymentAllocator::allocate(tx.as_mut(), allocation, self.clock.now()).await;
        finish(tx, result).await
    }

    /// Cancels a payment, giving its amount back to the targeted receivable
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn cancel_payment(&self, payment_id: PaymentId) -> Result<(), LedgerError> {
        let mut tx = self.port.begin().await?;
        let result = ReversalHandler::cancel(tx.as_mut(), payment_id, self.clock.now()).await;
        finish(tx, result).await.map(|_| ())
    }

    /// Edits the invoice number or notes of a recorded payment
    #[instrument(skip(self, update), fields(payment_id = %id))]
    pub async fn update_payment(&self, id: PaymentId, update: PaymentUpdate) -> Result<Payment, LedgerError> {
        update.validate()?;
        let mut tx = self.port.begin().await?;
        let result = async {
            let mut payment = tx
                .payment_for_update(id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Payment", id))?;
            payment.update(&update)?;
            tx.save_payment(&payment).await?;
            info!(payment_id = %id, "Payment updated");
            Ok::<_, LedgerError>(payment)
        }
        .await;

        finish(tx, result).await
    }

    // ========================================================================
    // Administrative receivable operations
    // ========================================================================

    /// Creates a receivable outside any enrollment plan
    #[instrument(skip(self, request), fields(student_id = %request.student_id))]
    pub async fn create_receivable(&self, request: NewReceivable) -> Result<Receivable, LedgerError> {
        request.validate()?;
        let total = Money::try_new(request.total_amount)?;
        let pending = match request.pending_balance {
            Some(pending) => Money::try_new(pending)?,
            None => total,
        };

        let mut tx = self.port.begin().await?;
        let result = self.create_receivable_in(tx.as_mut(), &request, total, pending).await;
        finish(tx, result).await
    }

    /// Updates the concept, due date or total of a receivable
    #[instrument(skip(self, update), fields(receivable_id = %id))]
    pub async fn update_receivable(&self, id: ReceivableId, update: ReceivableUpdate) -> Result<Receivable, LedgerError> {
        update.validate()?;
        let mut tx = self.port.begin().await?;
        let result = async {
            let mut receivable = locked_receivable(tx.as_mut(), id).await?;
            receivable.update(&update, self.clock.now())?;
            tx.save_receivable(&receivable).await?;
            Ok::<_, LedgerError>(receivable)
        }
        .await;

        finish(tx, result).await
    }

    /// Voids a single receivable, leaving its amounts frozen
    #[instrument(skip(self), fields(receivable_id = %id))]
    pub async fn void_receivable(&self, id: ReceivableId) -> Result<Receivable, LedgerError> {
        let mut tx = self.port.begin().await?;
        let result = async {
            let mut receivable = locked_receivable(tx.as_mut(), id).await?;
            receivable.void(self.clock.now())?;
            tx.save_receivable(&receivable).await?;
            info!(receivable_id = %id, pending = %receivable.pending_balance, "Receivable voided");
            Ok::<_, LedgerError>(receivable)
        }
        .await;

        finish(tx, result).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn receivable(&self, id: ReceivableId) -> Result<Receivable, LedgerError> {
        self.port
            .receivable(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Receivable", id))
    }

    /// A student's receivables, latest due date first
    pub async fn receivables_for_student(&self, student_id: StudentId) -> Result<Vec<Receivable>, LedgerError> {
        Ok(self.port.receivables_for_student(student_id).await?)
    }

    /// An enrollment's receivables, earliest due date first
    pub async fn receivables_for_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Vec<Receivable>, LedgerError> {
        Ok(self.port.receivables_for_enrollment(enrollment_id).await?)
    }

    /// Receivables of the enrollment holding a student code, earliest due
    /// date first
    pub async fn receivables_for_code(&self, code: &str) -> Result<Vec<Receivable>, LedgerError> {
        Ok(self.port.receivables_for_code(code.trim()).await?)
    }

    pub async fn payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        self.port
            .payment(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Payment", id))
    }

    pub async fn payments_for_receivable(&self, receivable_id: ReceivableId) -> Result<Vec<Payment>, LedgerError> {
        Ok(self.port.payments_for_receivable(receivable_id).await?)
    }

    pub async fn payments_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>, LedgerError> {
        Ok(self.port.payments_for_student(student_id).await?)
    }

    /// Sum of pending balances over the student's PENDING receivables
    pub async fn outstanding_debt(&self, student_id: StudentId) -> Result<Money, LedgerError> {
        let receivables = self.port.receivables_for_student(student_id).await?;
        Ok(Money::checked_sum(receivables.iter().map(Receivable::outstanding))?)
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    async fn create_plan_in(
        &self,
        tx: &mut dyn LedgerTransaction,
        request: &EnrollmentPlanRequest,
        costs: CostParams,
    ) -> Result<EnrollmentPlan, LedgerError> {
        let student = tx
            .student(request.student_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Student", request.student_id))?;
        if !tx.cycle_exists(request.cycle_id).await? {
            return Err(LedgerError::not_found("Cycle", request.cycle_id));
        }
        let career = tx
            .career(request.career_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Career", request.career_id))?;
        let admission = tx
            .admission(request.admission_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Admission", request.admission_id))?;

        if let Some(existing) = tx
            .find_active_enrollment(request.student_id, request.cycle_id, request.career_id, request.admission_id)
            .await?
        {
            return Err(LedgerError::conflict(
                existing.to_string(),
                format!(
                    "student {} already has an active enrollment for this cycle, career and admission",
                    request.student_id
                ),
            ));
        }

        let base = CodeGenerator::base_code(
            &admission.name,
            &career.area_name,
            &student.first_name,
            &student.last_name,
        )?;

        let now = self.clock.now();
        let mut enrollment = request.to_enrollment(costs, now);
        tx.insert_enrollment(&enrollment).await?;

        let code = CodeGenerator::new(self.settings.max_code_attempts)
            .assign(tx, enrollment.id, &base)
            .await?;
        enrollment.code_student = Some(code.clone());

        let plan = InstallmentPlanner::new(self.settings.installment_due_day)
            .plan(&enrollment, &code, self.clock.today(), now)?;

        for receivable in &plan.receivables {
            tx.insert_receivable(receivable).await?;
        }

        let mut payments = Vec::with_capacity(plan.payments.len());
        for planned in plan.payments {
            let outcome = PaymentAllocator::allocate(tx, planned.into_allocation(), now).await?;
            payments.push(outcome.payment);
        }

        let mut receivables = Vec::with_capacity(plan.receivables.len());
        for planned in &plan.receivables {
            let current = tx
                .receivable(planned.id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Receivable", planned.id))?;
            receivables.push(current);
        }

        info!(
            enrollment_id = %enrollment.id,
            code = %code,
            receivables = receivables.len(),
            payments = payments.len(),
            "Enrollment plan created"
        );

        Ok(EnrollmentPlan { enrollment, code, receivables, payments })
    }

    async fn create_receivable_in(
        &self,
        tx: &mut dyn LedgerTransaction,
        request: &NewReceivable,
        total: Money,
        pending: Money,
    ) -> Result<Receivable, LedgerError> {
        tx.student(request.student_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Student", request.student_id))?;

        let receivable = Receivable::with_balance(
            request.student_id,
            ReceivableKind::Manual,
            request.concept.trim(),
            total,
            pending,
            request.due_date,
            self.clock.now(),
        )?;
        tx.insert_receivable(&receivable).await?;

        info!(receivable_id = %receivable.id, total = %receivable.total_amount, "Receivable created");
        Ok(receivable)
    }
}

async fn locked_receivable(tx: &mut dyn LedgerTransaction, id: ReceivableId) -> Result<Receivable, LedgerError> {
    tx.receivable_for_update(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("Receivable", id))
}

/// Commits on success, rolls back on failure
async fn finish<T>(tx: Box<dyn LedgerTransaction>, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
