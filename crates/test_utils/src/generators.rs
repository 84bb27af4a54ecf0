//! Property-Based Test Generators
//!
//! Proptest strategies for ledger inputs that respect the request
//! validation rules, so properties exercise the engine rather than the
//! validators.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_ledger::PaymentMethod;

/// Cents, from one cent up to one million
pub fn positive_cents_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// A positive two-decimal amount
pub fn positive_amount_strategy() -> impl Strategy<Value = Decimal> {
    positive_cents_strategy().prop_map(|cents| Decimal::new(cents, 2))
}

/// A non-negative two-decimal amount below `max_cents`
pub fn amount_below_strategy(max_cents: i64) -> impl Strategy<Value = Decimal> {
    (0..max_cents.max(1)).prop_map(|cents| Decimal::new(cents, 2))
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::DigitalWallet),
    ]
}

/// Costs of an enrollment plan
#[derive(Debug, Clone)]
pub struct PlanCosts {
    pub total_cost: Decimal,
    pub discounts: Decimal,
    pub carnet_cost: Decimal,
    pub num_installments: u32,
    pub initial_payment: Decimal,
    pub payment_carnet: bool,
}

/// Credit plans where every installment comes out non-negative
///
/// Tuition is at least one cent per installment and the initial payment
/// never exceeds the first installment.
pub fn plan_costs_strategy() -> impl Strategy<Value = PlanCosts> {
    (1u32..=12u32, 0i64..1_000_000i64, 0i64..50_000i64, any::<bool>())
        .prop_flat_map(|(installments, discount_cents, carnet_cents, payment_carnet)| {
            let min_tuition = i64::from(installments) * 100;
            (min_tuition..min_tuition + 5_000_000i64).prop_flat_map(move |tuition_cents| {
                let first_installment = tuition_cents / i64::from(installments);
                (0..=first_installment).prop_map(move |initial_cents| PlanCosts {
                    total_cost: Decimal::new(tuition_cents + discount_cents, 2),
                    discounts: Decimal::new(discount_cents, 2),
                    carnet_cost: Decimal::new(carnet_cents, 2),
                    num_installments: installments,
                    initial_payment: Decimal::new(initial_cents, 2),
                    payment_carnet,
                })
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn plan_costs_leave_tuition_for_every_installment(costs in plan_costs_strategy()) {
            let tuition = costs.total_cost - costs.discounts;
            prop_assert!(tuition >= Decimal::from(costs.num_installments));
            prop_assert!(costs.initial_payment <= tuition / Decimal::from(costs.num_installments));
        }

        #[test]
        fn amounts_have_two_decimals(amount in positive_amount_strategy()) {
            prop_assert!(amount.scale() <= 2);
            prop_assert!(amount > Decimal::ZERO);
        }
    }
}
