//! Installment plan generation
//!
//! The planner is pure: given an enrollment, its student code and today's
//! date it decides which receivables to create and which payments to apply
//! immediately. The service persists the result and runs the payments
//! through the allocator inside the same transaction.

use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::clock::monthly_date;
use core_kernel::{Money, ReceivableId};

use crate::allocator::Allocation;
use crate::enrollment::{CostParams, Enrollment};
use crate::error::LedgerError;
use crate::payment::PaymentMethod;
use crate::receivable::{Receivable, ReceivableKind};

/// A payment to record right after the plan's receivables exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPayment {
    pub receivable_id: ReceivableId,
    pub amount: Money,
    pub invoice_number: String,
    pub notes: String,
}

impl PlannedPayment {
    /// Converts into an allocator request; plan payments are always cash
    pub fn into_allocation(self) -> Allocation {
        Allocation {
            receivable_id: self.receivable_id,
            amount: self.amount,
            method: PaymentMethod::Cash,
            notes: Some(self.notes),
            invoice_number: Some(self.invoice_number),
        }
    }
}

/// Receivables and immediate payments for one enrollment
#[derive(Debug, Clone)]
pub struct InstallmentPlan {
    /// Carnet fee first, then installments in order
    pub receivables: Vec<Receivable>,
    /// Carnet payment first, then the initial payment
    pub payments: Vec<PlannedPayment>,
}

/// Turns enrollment costs into receivables
#[derive(Debug, Clone, Copy)]
pub struct InstallmentPlanner {
    due_day: u32,
}

impl InstallmentPlanner {
    /// Creates a planner pinning installments to `due_day` of each month
    pub fn new(due_day: u32) -> Self {
        Self { due_day }
    }

    /// Splits the tuition into installment amounts
    ///
    /// Every installment but the last is the rounded average; the last takes
    /// the remainder so the amounts sum to the tuition exactly. Nothing is
    /// produced when discounts cover the whole cost.
    ///
    /// # Errors
    ///
    /// A tuition of a few cents spread over many installments can round the
    /// average up far enough to leave a negative remainder; that plan is
    /// rejected as a validation error.
    pub fn installment_amounts(params: &CostParams) -> Result<Vec<Money>, LedgerError> {
        let tuition = params.tuition_total();
        if !tuition.is_positive() {
            return Ok(Vec::new());
        }

        let amounts = tuition.split(params.installment_count())?;
        if amounts.iter().any(Money::is_negative) {
            return Err(LedgerError::validation(
                "num_installments",
                format!(
                    "tuition {} cannot be split into {} installments",
                    tuition,
                    params.installment_count()
                ),
            ));
        }
        Ok(amounts)
    }

    /// Due date of the 0-based installment `index`
    pub fn due_date(&self, today: NaiveDate, index: u32) -> Result<NaiveDate, LedgerError> {
        monthly_date(today, index, self.due_day).ok_or_else(|| {
            LedgerError::Internal(format!(
                "no due date {} month(s) after {} on day {}",
                index, today, self.due_day
            ))
        })
    }

    /// Builds the plan for an enrollment whose code is already assigned
    pub fn plan(
        &self,
        enrollment: &Enrollment,
        code: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<InstallmentPlan, LedgerError> {
        let costs = &enrollment.costs;
        let mut receivables = Vec::new();
        let mut payments = Vec::new();

        if costs.carnet_cost.is_positive() {
            let carnet = Receivable::new(
                enrollment.student_id,
                ReceivableKind::Carnet,
                format!("Carnet fee - {}", code),
                costs.carnet_cost,
                today,
                now,
            )?
            .for_enrollment(enrollment.id);

            if costs.payment_carnet {
                payments.push(PlannedPayment {
                    receivable_id: carnet.id,
                    amount: costs.carnet_cost,
                    invoice_number: format!("INV-{}-CARNET", carnet.id),
                    notes: format!("Carnet payment - {}", code),
                });
            }
            receivables.push(carnet);
        }

        let amounts = Self::installment_amounts(costs)?;
        let count = amounts.len();
        let mut first_installment = None;

        for (index, amount) in amounts.into_iter().enumerate() {
            let installment = Receivable::new(
                enrollment.student_id,
                ReceivableKind::Tuition,
                format!("Tuition - Installment {}/{} - {}", index + 1, count, code),
                amount,
                self.due_date(today, index as u32)?,
                now,
            )?
            .for_enrollment(enrollment.id);

            first_installment.get_or_insert(installment.id);
            receivables.push(installment);
        }

        if costs.initial_payment.is_positive() {
            let target = first_installment.ok_or_else(|| {
                LedgerError::validation("initial_payment", "no tuition installment to apply the initial payment to")
            })?;
            payments.push(PlannedPayment {
                receivable_id: target,
                amount: costs.initial_payment,
                invoice_number: format!("INV-{}-INIT", target),
                notes: format!("Initial payment - {}", code),
            });
        }

        Ok(InstallmentPlan { receivables, payments })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn installments_sum_to_tuition(
            total_cents in 1i64..100_000_000i64,
            discount_cents in 0i64..1_000_000i64,
            installments in 1u32..=12u32,
        ) {
            let params = CostParams {
                total_cost: Money::from_minor(total_cents),
                discounts: Money::from_minor(discount_cents),
                carnet_cost: Money::zero(),
                credit: true,
                num_installments: installments,
                initial_payment: Money::zero(),
                payment_carnet: false,
            };
            let tuition = params.tuition_total();

            match InstallmentPlanner::installment_amounts(&params) {
                Ok(amounts) if tuition.is_positive() => {
                    prop_assert_eq!(amounts.len(), installments as usize);
                    prop_assert_eq!(amounts.iter().sum::<Money>(), tuition);
                    prop_assert!(amounts.iter().all(|a| !a.is_negative()));
                }
                Ok(amounts) => prop_assert!(amounts.is_empty()),
                Err(err) => prop_assert!(matches!(err, LedgerError::Validation { .. }), "unexpected error: {:?}", err),
            }
        }
    }
}
