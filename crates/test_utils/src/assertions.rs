//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more meaningful failure
//! messages than bare `assert_eq!` on whole structs.

use core_kernel::Money;
use domain_ledger::{
    EnrollmentPlan, Payment, PaymentStatus, Receivable, ReceivableKind, ReceivableStatus,
};
use rust_decimal::Decimal;

/// Asserts a receivable's pending balance and status
pub fn assert_receivable(receivable: &Receivable, pending: Decimal, status: ReceivableStatus) {
    assert_eq!(
        receivable.pending_balance,
        Money::new(pending),
        "Receivable {} ({}): expected pending {}, got {}",
        receivable.id,
        receivable.concept,
        pending,
        receivable.pending_balance
    );
    assert_eq!(
        receivable.status, status,
        "Receivable {} ({}): expected status {}, got {}",
        receivable.id, receivable.concept, status, receivable.status
    );
}

/// Asserts the balance bounds and the status derived from them
///
/// Every receivable must satisfy `0 <= pending <= total`; non-void rows must
/// be PAID exactly when nothing is pending.
pub fn assert_ledger_consistent(receivables: &[Receivable]) {
    for r in receivables {
        assert!(
            !r.pending_balance.is_negative() && r.pending_balance <= r.total_amount,
            "Receivable {} out of bounds: pending {} total {}",
            r.id,
            r.pending_balance,
            r.total_amount
        );
        if r.status != ReceivableStatus::Void {
            let expected = if r.pending_balance.is_zero() {
                ReceivableStatus::Paid
            } else {
                ReceivableStatus::Pending
            };
            assert_eq!(
                r.status, expected,
                "Receivable {} has status {} with pending {}",
                r.id, r.status, r.pending_balance
            );
        }
    }
}

/// Asserts that the tuition receivables of a plan add up to its tuition total
///
/// Discounts covering the whole cost bill no tuition at all.
pub fn assert_tuition_matches(plan: &EnrollmentPlan) {
    let expected = plan.enrollment.costs.tuition_total().max(Money::zero());
    let billed: Money = plan
        .receivables
        .iter()
        .filter(|r| r.kind == ReceivableKind::Tuition)
        .map(|r| r.total_amount)
        .sum();
    assert_eq!(
        billed, expected,
        "Tuition receivables of {} add up to {}, expected {}",
        plan.code, billed, expected
    );
}

/// Asserts every payment is VOID and stamped
pub fn assert_all_void(payments: &[Payment]) {
    for p in payments {
        assert_eq!(p.status, PaymentStatus::Void, "Payment {} is still {}", p.id, p.status);
        assert!(p.voided_at.is_some(), "Payment {} is VOID without voided_at", p.id);
    }
}
