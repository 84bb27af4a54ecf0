//! Enrollments and the cost parameters that drive their billing

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{AdmissionId, CareerId, CycleId, EnrollmentId, Money, StudentId};

use crate::error::LedgerError;
use crate::payment::Payment;
use crate::receivable::Receivable;
use crate::validation::non_negative_amount;

/// Amounts and options that decide an enrollment's receivables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostParams {
    pub total_cost: Money,
    pub discounts: Money,
    pub carnet_cost: Money,
    /// Pay in installments rather than in one charge
    pub credit: bool,
    pub num_installments: u32,
    /// Paid up front against the first installment
    pub initial_payment: Money,
    /// Carnet fee is paid in full at enrollment
    pub payment_carnet: bool,
}

impl CostParams {
    /// Tuition left after discounts
    pub fn tuition_total(&self) -> Money {
        self.total_cost - self.discounts
    }

    /// Number of tuition receivables the plan produces
    pub fn installment_count(&self) -> u32 {
        if self.credit {
            self.num_installments.max(1)
        } else {
            1
        }
    }
}

/// A student's enrollment in a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub cycle_id: CycleId,
    pub career_id: CareerId,
    pub admission_id: AdmissionId,
    pub costs: CostParams,
    /// Unique student code, assigned inside the creating transaction
    pub code_student: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set when the enrollment and its ledger are voided
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Request for creating an enrollment and its installment plan
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnrollmentPlanRequest {
    pub student_id: StudentId,
    pub cycle_id: CycleId,
    pub career_id: CareerId,
    pub admission_id: AdmissionId,
    #[validate(custom(function = "non_negative_amount"))]
    pub total_cost: Decimal,
    #[validate(custom(function = "non_negative_amount"))]
    pub discounts: Decimal,
    #[validate(custom(function = "non_negative_amount"))]
    pub carnet_cost: Decimal,
    pub credit: bool,
    #[validate(range(max = 60))]
    pub num_installments: u32,
    #[validate(custom(function = "non_negative_amount"))]
    pub initial_payment: Decimal,
    pub payment_carnet: bool,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl EnrollmentPlanRequest {
    /// Validates the request and extracts its cost parameters
    ///
    /// An initial payment needs a tuition installment to land on, so it is
    /// rejected when discounts cover the whole cost.
    pub fn cost_params(&self) -> Result<CostParams, LedgerError> {
        self.validate()?;

        let params = CostParams {
            total_cost: Money::try_new(self.total_cost)?,
            discounts: Money::try_new(self.discounts)?,
            carnet_cost: Money::try_new(self.carnet_cost)?,
            credit: self.credit,
            num_installments: self.num_installments,
            initial_payment: Money::try_new(self.initial_payment)?,
            payment_carnet: self.payment_carnet,
        };

        if params.initial_payment.is_positive() && !params.tuition_total().is_positive() {
            return Err(LedgerError::validation(
                "initial_payment",
                format!(
                    "initial payment {} has no tuition installment to apply to (tuition total {})",
                    params.initial_payment,
                    params.tuition_total()
                ),
            ));
        }

        Ok(params)
    }

    /// Builds the enrollment row this request describes
    pub fn to_enrollment(&self, costs: CostParams, now: DateTime<Utc>) -> Enrollment {
        Enrollment {
            id: EnrollmentId::new(),
            student_id: self.student_id,
            cycle_id: self.cycle_id,
            career_id: self.career_id,
            admission_id: self.admission_id,
            costs,
            code_student: None,
            notes: self.notes.clone(),
            created_at: now,
            deleted_at: None,
        }
    }
}

/// Everything created for a new enrollment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentPlan {
    pub enrollment: Enrollment,
    pub code: String,
    /// Carnet fee first, then installments in order, as they stand after any
    /// immediate payments
    pub receivables: Vec<Receivable>,
    /// Carnet and initial payments recorded at enrollment
    pub payments: Vec<Payment>,
}
