//! Payment records
//!
//! One payment is written per allocation call and points at the receivable
//! the caller targeted, even when the waterfall spread the amount further.
//! The amount never changes after creation; corrections go through a
//! reversal, which voids the payment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use core_kernel::{Money, PaymentId, ReceivableId};

use crate::allocator::Allocation;
use crate::error::LedgerError;
use crate::guard::LedgerGuard;
use crate::validation::{not_blank, positive_amount};

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the front desk
    Cash,
    /// Bank transfer or deposit
    BankTransfer,
    /// Credit or debit card
    Card,
    /// Digital wallet
    DigitalWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Card => "CARD",
            PaymentMethod::DigitalWallet => "DIGITAL_WALLET",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMethod::Cash),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "CARD" => Ok(PaymentMethod::Card),
            "DIGITAL_WALLET" => Ok(PaymentMethod::DigitalWallet),
            other => Err(LedgerError::validation("method", format!("unknown payment method {}", other))),
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Recorded and applied
    Paid,
    /// Reversed; terminal
    Void,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Void => "VOID",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAID" => Ok(PaymentStatus::Paid),
            "VOID" => Ok(PaymentStatus::Void),
            other => Err(LedgerError::validation("status", format!("unknown payment status {}", other))),
        }
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Receivable the payment was made against
    pub receivable_id: ReceivableId,
    /// Full amount received
    pub amount_paid: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Status
    pub status: PaymentStatus,
    /// Receipt or invoice reference
    pub invoice_number: Option<String>,
    /// Notes
    pub notes: Option<String>,
    /// When the payment was received
    pub payment_date: DateTime<Utc>,
    /// When the payment was reversed
    pub voided_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a new recorded payment
    pub fn new(
        receivable_id: ReceivableId,
        amount_paid: Money,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            receivable_id,
            amount_paid,
            method,
            status: PaymentStatus::Paid,
            invoice_number: None,
            notes: None,
            payment_date: now,
            voided_at: None,
        }
    }

    /// Sets the invoice number
    pub fn with_invoice_number(mut self, invoice_number: Option<String>) -> Self {
        self.invoice_number = invoice_number;
        self
    }

    /// Sets the notes
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn is_void(&self) -> bool {
        self.status == PaymentStatus::Void
    }

    /// Applies an administrative edit of the invoice number or notes
    pub fn update(&mut self, update: &PaymentUpdate) -> Result<(), LedgerError> {
        LedgerGuard::ensure_editable(self)?;
        if let Some(invoice_number) = &update.invoice_number {
            self.invoice_number = Some(invoice_number.trim().to_string());
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        Ok(())
    }

    /// Marks the payment VOID
    pub fn void(&mut self, now: DateTime<Utc>) -> Result<(), LedgerError> {
        LedgerGuard::check_payment_transition(self, PaymentStatus::Void)?;
        self.status = PaymentStatus::Void;
        self.voided_at = Some(now);
        Ok(())
    }
}

/// Request to record a payment against a receivable
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentRequest {
    /// Receivable the payment targets first
    pub receivable_id: ReceivableId,
    /// Amount received
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    /// Payment method
    pub method: PaymentMethod,
    /// Notes
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    /// Receipt or invoice reference
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub invoice_number: Option<String>,
}

/// Fields an administrator may change on a payment
///
/// Amount, method, status and the target receivable are fixed once the
/// payment is recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PaymentUpdate {
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub invoice_number: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl PaymentRequest {
    /// Validates the request and converts it for the allocator
    pub fn into_allocation(self) -> Result<Allocation, LedgerError> {
        self.validate()?;
        Ok(Allocation {
            receivable_id: self.receivable_id,
            amount: Money::try_new(self.amount)?,
            method: self.method,
            notes: self.notes,
            invoice_number: self.invoice_number.map(|n| n.trim().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal) -> PaymentRequest {
        PaymentRequest {
            receivable_id: ReceivableId::new(),
            amount,
            method: PaymentMethod::BankTransfer,
            notes: None,
            invoice_number: None,
        }
    }

    #[test]
    fn test_new_payment_is_paid() {
        let payment = Payment::new(ReceivableId::new(), Money::new(dec!(10)), PaymentMethod::Cash, Utc::now());
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert!(payment.voided_at.is_none());
    }

    #[test]
    fn test_void_stamps_time_once() {
        let mut payment = Payment::new(ReceivableId::new(), Money::new(dec!(10)), PaymentMethod::Card, Utc::now());
        payment.void(Utc::now()).unwrap();
        assert!(payment.is_void());
        assert!(payment.voided_at.is_some());
        assert!(matches!(payment.void(Utc::now()), Err(LedgerError::AlreadyVoid { .. })));
    }

    #[test]
    fn test_method_serializes_screaming_snake() {
        let json = serde_json::to_string(&PaymentMethod::DigitalWallet).unwrap();
        assert_eq!(json, "\"DIGITAL_WALLET\"");
        assert_eq!("BANK_TRANSFER".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
    }

    #[test]
    fn test_request_rejects_non_positive_amount() {
        assert!(matches!(request(dec!(0)).into_allocation(), Err(LedgerError::Validation { .. })));
        assert!(matches!(request(dec!(-10)).into_allocation(), Err(LedgerError::Validation { .. })));
    }

    #[test]
    fn test_request_rejects_sub_cent_amount() {
        assert!(matches!(request(dec!(10.001)).into_allocation(), Err(LedgerError::Validation { .. })));
    }

    #[test]
    fn test_request_rejects_blank_invoice_number() {
        let mut r = request(dec!(10));
        r.invoice_number = Some("  ".to_string());
        assert!(r.into_allocation().is_err());
    }

    #[test]
    fn test_update_edits_only_descriptive_fields() {
        let mut payment = Payment::new(ReceivableId::new(), Money::new(dec!(10)), PaymentMethod::Cash, Utc::now());
        payment
            .update(&PaymentUpdate {
                invoice_number: Some(" B001-0042 ".to_string()),
                notes: None,
            })
            .unwrap();

        assert_eq!(payment.invoice_number.as_deref(), Some("B001-0042"));
        assert_eq!(payment.notes, None);
        assert_eq!(payment.amount_paid, Money::new(dec!(10)));
        assert_eq!(payment.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_update_rejects_void_payment() {
        let mut payment = Payment::new(ReceivableId::new(), Money::new(dec!(10)), PaymentMethod::Cash, Utc::now());
        payment.void(Utc::now()).unwrap();
        let update = PaymentUpdate { notes: Some("late receipt".to_string()), ..Default::default() };

        assert!(matches!(payment.update(&update), Err(LedgerError::AlreadyVoid { .. })));
        assert_eq!(payment.notes, None);
    }

    #[test]
    fn test_update_validation() {
        let blank = PaymentUpdate { invoice_number: Some("   ".to_string()), notes: None };
        assert!(blank.validate().is_err());
        let long = PaymentUpdate { invoice_number: None, notes: Some("x".repeat(501)) };
        assert!(long.validate().is_err());
        assert!(PaymentUpdate::default().validate().is_ok());
    }

    #[test]
    fn test_request_into_allocation() {
        let allocation = request(dec!(150.50)).into_allocation().unwrap();
        assert_eq!(allocation.amount, Money::new(dec!(150.50)));
        assert_eq!(allocation.method, PaymentMethod::BankTransfer);
    }
}
