//! Payment reversal and enrollment voiding
//!
//! A reversal gives the payment's amount back to the receivable it targeted
//! and voids the payment. Amounts that spilled over to other receivables are
//! not restored. Voiding an enrollment freezes its receivables and payments
//! as they are; nothing is deleted.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use core_kernel::{EnrollmentId, PaymentId};

use crate::error::LedgerError;
use crate::guard::LedgerGuard;
use crate::payment::{Payment, PaymentStatus};
use crate::ports::LedgerTransaction;

/// Counts of rows touched by an enrollment void
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoidSummary {
    pub receivables_voided: usize,
    pub payments_voided: usize,
}

/// Undoes payments and voids enrollment ledgers
pub struct ReversalHandler;

impl ReversalHandler {
    /// Cancels a payment
    ///
    /// Locks the target receivable before the payment, matching the lock
    /// order of the allocator and the enrollment void. If the receivable is
    /// already VOID its balance stays frozen and only the payment is voided.
    ///
    /// # Errors
    ///
    /// `NotFound` if the payment or its receivable is missing, `AlreadyVoid`
    /// if the payment was already cancelled.
    pub async fn cancel(
        tx: &mut dyn LedgerTransaction,
        payment_id: PaymentId,
        now: DateTime<Utc>,
    ) -> Result<Payment, LedgerError> {
        let receivable_id = tx
            .payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Payment", payment_id))?
            .receivable_id;

        let mut receivable = tx
            .receivable_for_update(receivable_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Receivable", receivable_id))?;
        let mut payment = tx
            .payment_for_update(payment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Payment", payment_id))?;

        LedgerGuard::check_payment_transition(&payment, PaymentStatus::Void)?;

        if receivable.is_void() {
            warn!(
                payment_id = %payment_id,
                receivable_id = %receivable_id,
                "Cancelling payment on a void receivable, balance stays frozen"
            );
        } else {
            receivable.restore(payment.amount_paid, now)?;
            tx.save_receivable(&receivable).await?;
        }

        payment.void(now)?;
        tx.save_payment(&payment).await?;

        info!(
            payment_id = %payment_id,
            receivable_id = %receivable_id,
            amount = %payment.amount_paid,
            balance_after = %receivable.pending_balance,
            status = %receivable.status,
            "Payment cancelled"
        );

        Ok(payment)
    }

    /// Voids an enrollment's receivables and their payments and marks the
    /// enrollment deleted
    ///
    /// # Errors
    ///
    /// `NotFound` if the enrollment does not exist, `AlreadyVoid` if it was
    /// already deleted.
    pub async fn void_enrollment(
        tx: &mut dyn LedgerTransaction,
        enrollment_id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<VoidSummary, LedgerError> {
        let mut enrollment = tx
            .enrollment_for_update(enrollment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Enrollment", enrollment_id))?;

        if enrollment.is_deleted() {
            return Err(LedgerError::already_void("Enrollment", enrollment_id));
        }

        let receivables = tx.receivables_for_enrollment_for_update(enrollment_id).await?;
        let receivable_ids: Vec<_> = receivables.iter().map(|r| r.id).collect();
        let payments = tx.payments_for_receivables_for_update(&receivable_ids).await?;

        let mut summary = VoidSummary::default();

        for mut receivable in receivables.into_iter().filter(|r| !r.is_void()) {
            receivable.void(now)?;
            tx.save_receivable(&receivable).await?;
            summary.receivables_voided += 1;
        }

        for mut payment in payments.into_iter().filter(|p| !p.is_void()) {
            payment.void(now)?;
            tx.save_payment(&payment).await?;
            summary.payments_voided += 1;
        }

        enrollment.deleted_at = Some(now);
        tx.save_enrollment(&enrollment).await?;

        info!(
            enrollment_id = %enrollment_id,
            code = enrollment.code_student.as_deref().unwrap_or_default(),
            receivables_voided = summary.receivables_voided,
            payments_voided = summary.payments_voided,
            "Enrollment ledger voided"
        );

        Ok(summary)
    }
}
