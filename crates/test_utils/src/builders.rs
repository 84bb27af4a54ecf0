//! Test Data Builders
//!
//! Builder patterns for ledger requests with sensible defaults. Tests set
//! only the fields they care about; the defaults reproduce the reference
//! enrollment: 1000 of tuition over 3 installments, a 50 carnet left
//! unpaid, and 100 paid up front.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AdmissionId, CareerId, CycleId, ReceivableId, StudentId};
use domain_ledger::{EnrollmentPlanRequest, NewReceivable, PaymentMethod, PaymentRequest};

use crate::fixtures::{LedgerWorld, TemporalFixtures};

/// Builder for enrollment plan requests
#[derive(Debug, Clone)]
pub struct EnrollmentPlanRequestBuilder {
    request: EnrollmentPlanRequest,
}

impl EnrollmentPlanRequestBuilder {
    pub fn new(
        student_id: StudentId,
        cycle_id: CycleId,
        career_id: CareerId,
        admission_id: AdmissionId,
    ) -> Self {
        Self {
            request: EnrollmentPlanRequest {
                student_id,
                cycle_id,
                career_id,
                admission_id,
                total_cost: dec!(1000),
                discounts: dec!(0),
                carnet_cost: dec!(50),
                credit: true,
                num_installments: 3,
                initial_payment: dec!(100),
                payment_carnet: false,
                notes: None,
            },
        }
    }

    /// Starts from the world's seeded cycle, career and admission
    pub fn for_world(world: &LedgerWorld, student_id: StudentId) -> Self {
        Self::new(student_id, world.cycle, world.career, world.admission)
    }

    pub fn total_cost(mut self, amount: Decimal) -> Self {
        self.request.total_cost = amount;
        self
    }

    pub fn discounts(mut self, amount: Decimal) -> Self {
        self.request.discounts = amount;
        self
    }

    pub fn carnet_cost(mut self, amount: Decimal) -> Self {
        self.request.carnet_cost = amount;
        self
    }

    /// Splits tuition into `installments` parts
    pub fn credit(mut self, installments: u32) -> Self {
        self.request.credit = true;
        self.request.num_installments = installments;
        self
    }

    /// Bills tuition as a single receivable
    pub fn cash(mut self) -> Self {
        self.request.credit = false;
        self.request.num_installments = 1;
        self
    }

    pub fn initial_payment(mut self, amount: Decimal) -> Self {
        self.request.initial_payment = amount;
        self
    }

    pub fn carnet_paid(mut self, paid: bool) -> Self {
        self.request.payment_carnet = paid;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.request.notes = Some(notes.into());
        self
    }

    pub fn build(self) -> EnrollmentPlanRequest {
        self.request
    }
}

/// Builder for payment requests
#[derive(Debug, Clone)]
pub struct PaymentRequestBuilder {
    request: PaymentRequest,
}

impl PaymentRequestBuilder {
    /// A cash payment of `amount` against `receivable_id`
    pub fn new(receivable_id: ReceivableId, amount: Decimal) -> Self {
        Self {
            request: PaymentRequest {
                receivable_id,
                amount,
                method: PaymentMethod::Cash,
                notes: None,
                invoice_number: None,
            },
        }
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.request.method = method;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.request.notes = Some(notes.into());
        self
    }

    pub fn invoice_number(mut self, invoice_number: impl Into<String>) -> Self {
        self.request.invoice_number = Some(invoice_number.into());
        self
    }

    pub fn build(self) -> PaymentRequest {
        self.request
    }
}

/// Builder for manual receivables
#[derive(Debug, Clone)]
pub struct NewReceivableBuilder {
    request: NewReceivable,
}

impl NewReceivableBuilder {
    /// A fully pending receivable due on the fixture date
    pub fn new(student_id: StudentId, total_amount: Decimal) -> Self {
        Self {
            request: NewReceivable {
                student_id,
                concept: "Laboratory fee".to_string(),
                total_amount,
                pending_balance: None,
                due_date: TemporalFixtures::today(),
            },
        }
    }

    pub fn concept(mut self, concept: impl Into<String>) -> Self {
        self.request.concept = concept.into();
        self
    }

    pub fn pending_balance(mut self, balance: Decimal) -> Self {
        self.request.pending_balance = Some(balance);
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.request.due_date = date;
        self
    }

    pub fn build(self) -> NewReceivable {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let request = EnrollmentPlanRequestBuilder::new(
            StudentId::new(),
            CycleId::new(),
            CareerId::new(),
            AdmissionId::new(),
        )
        .build();

        assert_eq!(request.total_cost, dec!(1000));
        assert_eq!(request.num_installments, 3);
        assert!(request.credit);
        assert!(!request.payment_carnet);
    }

    #[test]
    fn test_cash_resets_installments() {
        let request = EnrollmentPlanRequestBuilder::new(
            StudentId::new(),
            CycleId::new(),
            CareerId::new(),
            AdmissionId::new(),
        )
        .credit(6)
        .cash()
        .build();

        assert!(!request.credit);
        assert_eq!(request.num_installments, 1);
    }

    #[test]
    fn test_payment_builder() {
        let request = PaymentRequestBuilder::new(ReceivableId::new(), dec!(150))
            .method(PaymentMethod::Card)
            .invoice_number("F001-12")
            .build();

        assert_eq!(request.method, PaymentMethod::Card);
        assert_eq!(request.invoice_number.as_deref(), Some("F001-12"));
    }
}
