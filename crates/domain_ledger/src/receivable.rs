//! Receivables: amounts a student owes
//!
//! A receivable is created by the installment planner or by an administrative
//! correction and afterwards only changes through the payment waterfall, a
//! reversal, a guarded administrative update or a void.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use core_kernel::{EnrollmentId, Money, ReceivableId, StudentId};

use crate::error::LedgerError;
use crate::guard::LedgerGuard;
use crate::validation::{non_negative_amount, not_blank};

/// Receivable status
///
/// `Paid` holds exactly when the pending balance is zero; `Void` is terminal
/// and excluded from every debt total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceivableStatus {
    /// Balance outstanding
    Pending,
    /// Fully settled
    Paid,
    /// Cancelled with its owning enrollment or by an administrator
    Void,
}

impl ReceivableStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableStatus::Pending => "PENDING",
            ReceivableStatus::Paid => "PAID",
            ReceivableStatus::Void => "VOID",
        }
    }
}

impl fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceivableStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReceivableStatus::Pending),
            "PAID" => Ok(ReceivableStatus::Paid),
            "VOID" => Ok(ReceivableStatus::Void),
            other => Err(LedgerError::validation("status", format!("unknown receivable status {}", other))),
        }
    }
}

/// What a receivable charges for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceivableKind {
    /// Student ID card fee
    Carnet,
    /// One installment of an enrollment's tuition
    Tuition,
    /// Created directly by an administrator
    Manual,
}

impl ReceivableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableKind::Carnet => "CARNET",
            ReceivableKind::Tuition => "TUITION",
            ReceivableKind::Manual => "MANUAL",
        }
    }
}

impl FromStr for ReceivableKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARNET" => Ok(ReceivableKind::Carnet),
            "TUITION" => Ok(ReceivableKind::Tuition),
            "MANUAL" => Ok(ReceivableKind::Manual),
            other => Err(LedgerError::validation("kind", format!("unknown receivable kind {}", other))),
        }
    }
}

/// An amount owed by a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receivable {
    /// Unique identifier
    pub id: ReceivableId,
    /// Student who owes the amount
    pub student_id: StudentId,
    /// Enrollment whose plan generated this row, if any
    pub enrollment_id: Option<EnrollmentId>,
    /// What the row charges for
    pub kind: ReceivableKind,
    /// Human-readable description, carries the student code for plan rows
    pub concept: String,
    /// Amount originally charged
    pub total_amount: Money,
    /// Amount still owed
    pub pending_balance: Money,
    /// Status
    pub status: ReceivableStatus,
    /// Due date
    pub due_date: NaiveDate,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Receivable {
    /// Creates a receivable with its whole amount pending
    ///
    /// # Errors
    ///
    /// Returns a validation error if `total_amount` is negative.
    pub fn new(
        student_id: StudentId,
        kind: ReceivableKind,
        concept: impl Into<String>,
        total_amount: Money,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        Self::with_balance(student_id, kind, concept, total_amount, total_amount, due_date, now)
    }

    /// Creates a receivable with an explicit pending balance
    pub fn with_balance(
        student_id: StudentId,
        kind: ReceivableKind,
        concept: impl Into<String>,
        total_amount: Money,
        pending_balance: Money,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let id = ReceivableId::new();
        LedgerGuard::check_amounts(id, total_amount, pending_balance)?;

        Ok(Self {
            id,
            student_id,
            enrollment_id: None,
            kind,
            concept: concept.into(),
            total_amount,
            pending_balance,
            status: LedgerGuard::status_for(pending_balance),
            due_date,
            created_at: now,
            updated_at: now,
        })
    }

    /// Links the receivable to the enrollment that generated it
    pub fn for_enrollment(mut self, enrollment_id: EnrollmentId) -> Self {
        self.enrollment_id = Some(enrollment_id);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReceivableStatus::Pending
    }

    pub fn is_void(&self) -> bool {
        self.status == ReceivableStatus::Void
    }

    /// Amount that counts towards the student's debt
    pub fn outstanding(&self) -> Money {
        match self.status {
            ReceivableStatus::Pending => self.pending_balance,
            ReceivableStatus::Paid | ReceivableStatus::Void => Money::zero(),
        }
    }

    /// Applies up to `amount` against the pending balance
    ///
    /// Returns the portion actually applied, which is capped at the pending
    /// balance.
    pub fn apply(&mut self, amount: Money, now: DateTime<Utc>) -> Result<Money, LedgerError> {
        let applied = amount.min(self.pending_balance);
        let balance = self.pending_balance.checked_sub(&applied)?;
        self.transition_balance(balance, now)?;
        Ok(applied)
    }

    /// Adds `amount` back to the pending balance, clamped to the total
    pub fn restore(&mut self, amount: Money, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let balance = self.pending_balance.checked_add(&amount)?.min(self.total_amount);
        self.transition_balance(balance, now)
    }

    /// Flips the status to VOID, leaving both amounts frozen
    pub fn void(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        LedgerGuard::check_receivable_transition(self, ReceivableStatus::Void)?;
        self.status = ReceivableStatus::Void;
        self.updated_at = now;
        Ok(())
    }

    /// Applies an administrative update
    pub fn update(&mut self, update: &ReceivableUpdate, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.is_void() {
            return Err(LedgerError::VoidedAccount(self.id));
        }

        let total_amount = match update.total_amount {
            Some(total) => {
                let total = Money::try_new(total)?;
                LedgerGuard::check_total_update(self, total)?;
                total
            }
            None => self.total_amount,
        };

        if let Some(concept) = &update.concept {
            self.concept = concept.trim().to_string();
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        self.total_amount = total_amount;
        self.updated_at = now;
        Ok(())
    }

    fn transition_balance(&mut self, balance: Money, now: DateTime<Utc>) -> Result<(), LedgerError> {
        LedgerGuard::check_amounts(self.id, self.total_amount, balance)?;
        let status = LedgerGuard::status_for(balance);
        LedgerGuard::check_receivable_transition(self, status)?;
        self.pending_balance = balance;
        self.status = status;
        self.updated_at = now;
        Ok(())
    }
}

/// Request for creating a receivable outside an enrollment plan
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReceivable {
    /// Student who owes the amount
    pub student_id: StudentId,
    /// Description
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub concept: String,
    /// Amount charged
    #[validate(custom(function = "non_negative_amount"))]
    pub total_amount: Decimal,
    /// Amount still owed, defaults to the total
    #[validate(custom(function = "non_negative_amount"))]
    pub pending_balance: Option<Decimal>,
    /// Due date
    pub due_date: NaiveDate,
}

/// Fields an administrator may change on a receivable
///
/// Balances and status are deliberately absent: they only move through
/// payments, reversals and voids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReceivableUpdate {
    #[validate(length(min = 1, max = 255), custom(function = "not_blank"))]
    pub concept: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[validate(custom(function = "non_negative_amount"))]
    pub total_amount: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn receivable(total: Decimal) -> Receivable {
        Receivable::new(
            StudentId::new(),
            ReceivableKind::Tuition,
            "Tuition - Installment 1/1 - TEST",
            Money::new(total),
            NaiveDate::from_ymd_opt(2025, 1, 30).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_receivable_is_pending() {
        let r = receivable(dec!(100));
        assert_eq!(r.status, ReceivableStatus::Pending);
        assert_eq!(r.pending_balance, r.total_amount);
        assert!(r.enrollment_id.is_none());
    }

    #[test]
    fn test_zero_total_starts_paid() {
        let r = receivable(dec!(0));
        assert_eq!(r.status, ReceivableStatus::Paid);
        assert_eq!(r.outstanding(), Money::zero());
    }

    #[test]
    fn test_negative_total_rejected() {
        let result = Receivable::new(
            StudentId::new(),
            ReceivableKind::Manual,
            "Refund",
            Money::new(dec!(-1)),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            Utc::now(),
        );
        assert!(matches!(result, Err(LedgerError::Validation { .. })));
    }

    #[test]
    fn test_apply_partial_and_full() {
        let mut r = receivable(dec!(100));
        let applied = r.apply(Money::new(dec!(40)), Utc::now()).unwrap();
        assert_eq!(applied, Money::new(dec!(40)));
        assert_eq!(r.pending_balance, Money::new(dec!(60)));
        assert_eq!(r.status, ReceivableStatus::Pending);

        let applied = r.apply(Money::new(dec!(500)), Utc::now()).unwrap();
        assert_eq!(applied, Money::new(dec!(60)));
        assert_eq!(r.status, ReceivableStatus::Paid);
        assert!(r.pending_balance.is_zero());
    }

    #[test]
    fn test_restore_reopens_and_clamps() {
        let mut r = receivable(dec!(100));
        r.apply(Money::new(dec!(100)), Utc::now()).unwrap();
        r.restore(Money::new(dec!(150)), Utc::now()).unwrap();
        assert_eq!(r.status, ReceivableStatus::Pending);
        assert_eq!(r.pending_balance, Money::new(dec!(100)));
    }

    #[test]
    fn test_void_is_terminal() {
        let mut r = receivable(dec!(100));
        r.void(Utc::now()).unwrap();
        assert_eq!(r.pending_balance, Money::new(dec!(100)));
        assert!(matches!(r.void(Utc::now()), Err(LedgerError::VoidedAccount(_))));
        assert!(matches!(r.apply(Money::new(dec!(1)), Utc::now()), Err(LedgerError::VoidedAccount(_))));
        assert!(matches!(r.restore(Money::new(dec!(1)), Utc::now()), Err(LedgerError::VoidedAccount(_))));
    }

    #[test]
    fn test_update_rejects_total_below_pending() {
        let mut r = receivable(dec!(100));
        r.apply(Money::new(dec!(30)), Utc::now()).unwrap();
        let update = ReceivableUpdate {
            total_amount: Some(dec!(50)),
            ..Default::default()
        };
        assert!(matches!(r.update(&update, Utc::now()), Err(LedgerError::Validation { .. })));

        let update = ReceivableUpdate {
            total_amount: Some(dec!(70)),
            concept: Some("  Corrected  ".to_string()),
            ..Default::default()
        };
        r.update(&update, Utc::now()).unwrap();
        assert_eq!(r.total_amount, Money::new(dec!(70)));
        assert_eq!(r.concept, "Corrected");
    }

    #[test]
    fn test_status_roundtrip_str() {
        for status in [ReceivableStatus::Pending, ReceivableStatus::Paid, ReceivableStatus::Void] {
            assert_eq!(status.as_str().parse::<ReceivableStatus>().unwrap(), status);
        }
        assert!("OPEN".parse::<ReceivableStatus>().is_err());
    }

    #[test]
    fn test_new_receivable_request_validation() {
        let request = NewReceivable {
            student_id: StudentId::new(),
            concept: "   ".to_string(),
            total_amount: dec!(-5),
            pending_balance: None,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("concept"));
        assert!(fields.contains_key("total_amount"));
    }
}
