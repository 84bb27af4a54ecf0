//! Balance and state-transition rules
//!
//! Every component that touches a receivable or a payment goes through these
//! checks, so the ledger invariants hold no matter which path mutated a row:
//!
//! - `0 <= pending_balance <= total_amount`
//! - `status == PAID` exactly when `pending_balance == 0` (unless VOID)
//! - VOID is terminal for both receivables and payments

use core_kernel::{Money, ReceivableId};

use crate::error::LedgerError;
use crate::payment::{Payment, PaymentStatus};
use crate::receivable::{Receivable, ReceivableStatus};

/// Shared ledger rules
pub struct LedgerGuard;

impl LedgerGuard {
    /// Checks the amount bounds of a receivable
    pub fn check_amounts(id: ReceivableId, total: Money, pending: Money) -> Result<(), LedgerError> {
        if total.is_negative() {
            return Err(LedgerError::validation(
                "total_amount",
                format!("receivable {} total {} is negative", id, total),
            ));
        }
        if pending.is_negative() {
            return Err(LedgerError::validation(
                "pending_balance",
                format!("receivable {} balance {} is negative", id, pending),
            ));
        }
        if pending > total {
            return Err(LedgerError::validation(
                "pending_balance",
                format!("receivable {} balance {} exceeds total {}", id, pending, total),
            ));
        }
        Ok(())
    }

    /// The non-void status implied by a pending balance
    pub fn status_for(pending: Money) -> ReceivableStatus {
        if pending.is_zero() {
            ReceivableStatus::Paid
        } else {
            ReceivableStatus::Pending
        }
    }

    /// Checks that a receivable may move to `to`
    ///
    /// PENDING -> PAID, PAID -> PENDING (reversal) and any live status -> VOID
    /// are allowed. Nothing leaves VOID.
    pub fn check_receivable_transition(
        receivable: &Receivable,
        to: ReceivableStatus,
    ) -> Result<(), LedgerError> {
        use ReceivableStatus::*;

        match (receivable.status, to) {
            (Void, _) => Err(LedgerError::VoidedAccount(receivable.id)),
            (Paid, Paid) => Err(LedgerError::AlreadyPaid(receivable.id)),
            (Pending, Pending) | (Pending, Paid) | (Paid, Pending) => Ok(()),
            (Pending, Void) | (Paid, Void) => Ok(()),
        }
    }

    /// Checks that a payment may move to `to`
    pub fn check_payment_transition(payment: &Payment, to: PaymentStatus) -> Result<(), LedgerError> {
        use PaymentStatus::*;

        match (payment.status, to) {
            (Void, _) => Err(LedgerError::already_void("Payment", payment.id)),
            (Paid, Void) => Ok(()),
            (Paid, Paid) => Err(LedgerError::validation(
                "status",
                format!("payment {} is already recorded", payment.id),
            )),
        }
    }

    /// Checks that a payment's descriptive fields may still be edited
    pub fn ensure_editable(payment: &Payment) -> Result<(), LedgerError> {
        match payment.status {
            PaymentStatus::Paid => Ok(()),
            PaymentStatus::Void => Err(LedgerError::already_void("Payment", payment.id)),
        }
    }

    /// Checks that a receivable can take a payment
    pub fn ensure_payable(receivable: &Receivable) -> Result<(), LedgerError> {
        match receivable.status {
            ReceivableStatus::Pending => Ok(()),
            ReceivableStatus::Paid => Err(LedgerError::AlreadyPaid(receivable.id)),
            ReceivableStatus::Void => Err(LedgerError::VoidedAccount(receivable.id)),
        }
    }

    /// Checks that a new total does not drop below what is still owed
    pub fn check_total_update(receivable: &Receivable, total: Money) -> Result<(), LedgerError> {
        if total < receivable.pending_balance {
            return Err(LedgerError::validation(
                "total_amount",
                format!(
                    "receivable {} total {} would fall below pending balance {}",
                    receivable.id, total, receivable.pending_balance
                ),
            ));
        }
        Self::check_amounts(receivable.id, total, receivable.pending_balance)
    }
}
