//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the ledger. Dates and amounts are
//! fixed so assertions stay predictable; student names come from `fake`
//! where the name itself does not matter.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rust_decimal_macros::dec;

use core_kernel::{AdmissionId, CareerId, CycleId, FixedClock, Money, StudentId};
use domain_ledger::{InMemoryLedger, LedgerService, LedgerSettings};

/// Fixture for calendar data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The "today" every fixture clock is frozen at
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    /// Noon UTC on [`TemporalFixtures::today`]
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    /// Clock frozen at [`TemporalFixtures::today`]
    pub fn clock() -> FixedClock {
        FixedClock::at_date(Self::today())
    }

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }
}

/// Fixture for money values used across scenarios
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn total_cost() -> Money {
        Money::new(dec!(1000.00))
    }

    pub fn carnet_cost() -> Money {
        Money::new(dec!(50.00))
    }

    pub fn initial_payment() -> Money {
        Money::new(dec!(100.00))
    }

    /// One third of the total cost, rounded to cents
    pub fn installment() -> Money {
        Money::new(dec!(333.33))
    }

    /// The last installment absorbs the rounding drift
    pub fn last_installment() -> Money {
        Money::new(dec!(333.34))
    }
}

/// Fixture for master data names
pub struct StringFixtures;

impl StringFixtures {
    pub fn career() -> &'static str {
        "Civil Engineering"
    }

    pub fn area() -> &'static str {
        "Engineering"
    }

    pub fn admission() -> &'static str {
        "2025-I"
    }

    /// The first code handed out to Juan Perez in the fixture world
    pub fn first_code() -> &'static str {
        "2025-I-Engineering-JUPE-001"
    }

    /// A random `(first, last)` name pair
    pub fn student_name() -> (String, String) {
        (FirstName().fake(), LastName().fake())
    }
}

/// A seeded in-memory ledger with a service over it
pub struct LedgerWorld {
    pub store: InMemoryLedger,
    pub service: Arc<LedgerService>,
    pub cycle: CycleId,
    pub career: CareerId,
    pub admission: AdmissionId,
}

impl LedgerWorld {
    /// Seeds one cycle, career and admission; the clock reads [`TemporalFixtures::today`]
    pub async fn new() -> Self {
        Self::with_settings(LedgerSettings::default()).await
    }

    pub async fn with_settings(settings: LedgerSettings) -> Self {
        let store = InMemoryLedger::new();
        let cycle = store.add_cycle().await;
        let career = store.add_career(StringFixtures::career(), StringFixtures::area()).await;
        let admission = store.add_admission(StringFixtures::admission()).await;

        let service = LedgerService::new(
            Arc::new(store.clone()),
            Arc::new(TemporalFixtures::clock()),
            settings,
        )
        .expect("fixture settings are valid");

        Self {
            store,
            service: Arc::new(service),
            cycle,
            career,
            admission,
        }
    }

    /// Adds a student named Juan Perez
    pub async fn juan_perez(&self) -> StudentId {
        self.store.add_student("Juan", "Perez").await
    }

    /// Adds a student with a generated name
    pub async fn any_student(&self) -> StudentId {
        let (first, last) = StringFixtures::student_name();
        self.store.add_student(&first, &last).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installments_add_up_to_total() {
        let sum = MoneyFixtures::installment() + MoneyFixtures::installment() + MoneyFixtures::last_installment();
        assert_eq!(sum, MoneyFixtures::total_cost());
    }

    #[test]
    fn test_generated_names_are_not_blank() {
        let (first, last) = StringFixtures::student_name();
        assert!(!first.trim().is_empty());
        assert!(!last.trim().is_empty());
    }
}
