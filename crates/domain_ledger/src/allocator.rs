//! The payment waterfall
//!
//! One payment is applied to the receivable the caller picked and whatever
//! is left over spills into the student's other pending receivables,
//! earliest due date first. The whole walk, and the single payment record it
//! produces, happen inside the caller's transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use core_kernel::{Money, ReceivableId};

use crate::error::LedgerError;
use crate::guard::LedgerGuard;
use crate::payment::{Payment, PaymentMethod};
use crate::ports::LedgerTransaction;
use crate::receivable::Receivable;

/// A validated request to apply money against a receivable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub receivable_id: ReceivableId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub invoice_number: Option<String>,
}

/// How much of a payment landed on one receivable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub receivable_id: ReceivableId,
    pub applied: Money,
    pub balance_after: Money,
}

/// The recorded payment and its breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub payment: Payment,
    /// In waterfall order, target first
    pub applications: Vec<Application>,
}

/// Applies payments across a student's pending receivables
pub struct PaymentAllocator;

impl PaymentAllocator {
    /// Orders the walk: target first, then the other pending receivables by
    /// due date, creation time and id
    pub fn waterfall_order(target: ReceivableId, receivables: Vec<Receivable>) -> Vec<Receivable> {
        let (mut head, mut rest): (Vec<_>, Vec<_>) =
            receivables.into_iter().partition(|r| r.id == target);
        rest.retain(Receivable::is_pending);
        rest.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        head.truncate(1);
        head.extend(rest);
        head
    }

    /// Records a payment and spreads it over the student's debt
    ///
    /// # Errors
    ///
    /// - `Validation` if the amount is not positive
    /// - `NotFound` if the target receivable does not exist
    /// - `VoidedAccount` / `AlreadyPaid` if the target cannot take payments
    /// - `Overpayment` if the amount exceeds the student's pending debt
    ///
    /// All checks run before anything is written.
    pub async fn allocate(
        tx: &mut dyn LedgerTransaction,
        allocation: Allocation,
        now: DateTime<Utc>,
    ) -> Result<AllocationOutcome, LedgerError> {
        if !allocation.amount.is_positive() {
            return Err(LedgerError::validation(
                "amount",
                format!("payment amount {} must be greater than zero", allocation.amount),
            ));
        }

        // Read the target unlocked only to learn the student, then lock all of
        // the student's rows in id order.
        let student_id = tx
            .receivable(allocation.receivable_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Receivable", allocation.receivable_id))?
            .student_id;

        let locked = tx.lock_student_receivables(student_id).await?;
        let target = locked
            .iter()
            .find(|r| r.id == allocation.receivable_id)
            .ok_or_else(|| LedgerError::not_found("Receivable", allocation.receivable_id))?;
        LedgerGuard::ensure_payable(target)?;

        let outstanding = Money::checked_sum(locked.iter().map(Receivable::outstanding))?;
        if allocation.amount > outstanding {
            return Err(LedgerError::Overpayment {
                student_id,
                amount: allocation.amount,
                outstanding,
            });
        }

        let mut remaining = allocation.amount;
        let mut applications = Vec::new();

        for mut candidate in Self::waterfall_order(allocation.receivable_id, locked) {
            if remaining.is_zero() {
                break;
            }

            let applied = candidate.apply(remaining, now)?;
            remaining = remaining.checked_sub(&applied)?;
            tx.save_receivable(&candidate).await?;

            debug!(
                receivable_id = %candidate.id,
                applied = %applied,
                balance_after = %candidate.pending_balance,
                status = %candidate.status,
                "Waterfall step"
            );
            applications.push(Application {
                receivable_id: candidate.id,
                applied,
                balance_after: candidate.pending_balance,
            });
        }

        if !remaining.is_zero() {
            return Err(LedgerError::Internal(format!(
                "waterfall left {} unapplied for receivable {}",
                remaining, allocation.receivable_id
            )));
        }

        let payment = Payment::new(allocation.receivable_id, allocation.amount, allocation.method, now)
            .with_notes(allocation.notes)
            .with_invoice_number(allocation.invoice_number);
        tx.insert_payment(&payment).await?;

        info!(
            payment_id = %payment.id,
            receivable_id = %payment.receivable_id,
            student_id = %student_id,
            amount = %payment.amount_paid,
            receivables_touched = applications.len(),
            "Payment allocated"
        );

        Ok(AllocationOutcome { payment, applications })
    }
}
