//! Cross-crate workflow tests
//!
//! The in-memory module drives whole student lifecycles through the
//! service. The postgres module repeats the critical flows against a real
//! database and needs Docker: run it with `cargo test -- --ignored`.

use rust_decimal_macros::dec;

use domain_ledger::{LedgerError, PaymentMethod, ReceivableKind, ReceivableStatus};
use test_utils::{
    assert_all_void, assert_ledger_consistent, assert_receivable, assert_tuition_matches,
    EnrollmentPlanRequestBuilder, LedgerWorld, NewReceivableBuilder, PaymentRequestBuilder,
    StringFixtures, TemporalFixtures,
};

mod in_memory {
    use super::*;
    use core_kernel::Money;
    use proptest::prelude::*;
    use test_utils::plan_costs_strategy;

    #[tokio::test]
    async fn test_semester_lifecycle() {
        let world = LedgerWorld::new().await;
        let student = world.juan_perez().await;

        // Enroll: carnet 50, three installments, 100 up front
        let plan = world
            .service
            .create_enrollment_plan(EnrollmentPlanRequestBuilder::for_world(&world, student).build())
            .await
            .unwrap();
        assert_eq!(plan.code, StringFixtures::first_code());
        assert_tuition_matches(&plan);

        let carnet = plan.receivables[0].id;
        let first = plan.receivables[1].id;
        let second = plan.receivables[2].id;
        let third = plan.receivables[3].id;

        // A lab fee due before the second installment
        let lab = world
            .service
            .create_receivable(
                NewReceivableBuilder::new(student, dec!(40))
                    .due(TemporalFixtures::date(2025, 2, 10))
                    .build(),
            )
            .await
            .unwrap();

        // 233.33 settles installment 1; the other 50 go to the carnet due today
        let outcome = world
            .service
            .record_payment_detailed(
                PaymentRequestBuilder::new(first, dec!(283.33))
                    .method(PaymentMethod::BankTransfer)
                    .invoice_number("F001-0001")
                    .build(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.applications.len(), 2);
        assert_eq!(outcome.payment.receivable_id, first);
        assert_eq!(outcome.payment.amount_paid, Money::new(dec!(283.33)));

        assert_receivable(&world.service.receivable(first).await.unwrap(), dec!(0), ReceivableStatus::Paid);
        assert_receivable(&world.service.receivable(carnet).await.unwrap(), dec!(0), ReceivableStatus::Paid);

        // Paying on installment 3 flows back to the lab fee, then installment 2
        world
            .service
            .record_payment(PaymentRequestBuilder::new(third, dec!(400)).build())
            .await
            .unwrap();
        assert_receivable(&world.service.receivable(third).await.unwrap(), dec!(0), ReceivableStatus::Paid);
        assert_receivable(&world.service.receivable(lab.id).await.unwrap(), dec!(0), ReceivableStatus::Paid);
        assert_receivable(&world.service.receivable(second).await.unwrap(), dec!(306.67), ReceivableStatus::Pending);

        assert_eq!(world.service.outstanding_debt(student).await.unwrap(), Money::new(dec!(306.67)));
        assert_ledger_consistent(&world.service.receivables_for_student(student).await.unwrap());
    }

    #[tokio::test]
    async fn test_withdrawal_voids_everything_and_allows_re_enrollment() {
        let world = LedgerWorld::new().await;
        let student = world.juan_perez().await;

        let plan = world
            .service
            .create_enrollment_plan(
                EnrollmentPlanRequestBuilder::for_world(&world, student)
                    .carnet_paid(true)
                    .build(),
            )
            .await
            .unwrap();

        let summary = world.service.void_enrollment_ledger(plan.enrollment.id).await.unwrap();
        assert_eq!(summary.receivables_voided, 4);
        assert_eq!(summary.payments_voided, 2);

        let receivables = world.service.receivables_for_enrollment(plan.enrollment.id).await.unwrap();
        assert!(receivables.iter().all(|r| r.status == ReceivableStatus::Void));
        assert_ledger_consistent(&receivables);
        assert_all_void(&world.service.payments_for_student(student).await.unwrap());
        assert!(world.service.outstanding_debt(student).await.unwrap().is_zero());

        // Payments against the voided ledger are refused
        let refused = world
            .service
            .record_payment(PaymentRequestBuilder::new(plan.receivables[2].id, dec!(10)).build())
            .await;
        assert!(matches!(refused, Err(LedgerError::VoidedAccount(_))));

        // The student can enroll again and gets the next code
        let again = world
            .service
            .create_enrollment_plan(EnrollmentPlanRequestBuilder::for_world(&world, student).cash().build())
            .await
            .unwrap();
        assert_eq!(again.code, "2025-I-Engineering-JUPE-002");
        assert_eq!(
            again.receivables.iter().filter(|r| r.kind == ReceivableKind::Tuition).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_generated_students_get_codes_from_their_initials() {
        let world = LedgerWorld::new().await;
        let student = world.any_student().await;

        let plan = world
            .service
            .create_enrollment_plan(EnrollmentPlanRequestBuilder::for_world(&world, student).build())
            .await
            .unwrap();

        assert!(plan.code.starts_with("2025-I-Engineering-"));
        assert!(plan.code.ends_with("-001"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn plans_bill_exact_tuition_and_stay_consistent(costs in plan_costs_strategy()) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let world = LedgerWorld::new().await;
                let student = world.juan_perez().await;
                let request = EnrollmentPlanRequestBuilder::for_world(&world, student)
                    .total_cost(costs.total_cost)
                    .discounts(costs.discounts)
                    .carnet_cost(costs.carnet_cost)
                    .credit(costs.num_installments)
                    .initial_payment(costs.initial_payment)
                    .carnet_paid(costs.payment_carnet)
                    .build();

                let plan = world.service.create_enrollment_plan(request).await.unwrap();

                assert_tuition_matches(&plan);
                assert_ledger_consistent(&plan.receivables);
                let tuition = plan.receivables.iter().filter(|r| r.kind == ReceivableKind::Tuition).count();
                prop_assert_eq!(tuition, costs.num_installments as usize);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}

mod postgres {
    use super::*;
    use std::sync::Arc;

    use core_kernel::{AdapterType, AdmissionId, CareerId, CycleId, DomainPort, Money};
    use domain_ledger::{LedgerService, LedgerSettings, PaymentUpdate};
    use infra_db::PostgresLedgerAdapter;
    use test_utils::{create_isolated_test_database, TestDatabase};

    struct PgWorld {
        db: TestDatabase,
        service: Arc<LedgerService>,
        cycle: CycleId,
        career: CareerId,
        admission: AdmissionId,
    }

    async fn pg_world() -> PgWorld {
        let db = create_isolated_test_database().await.expect("postgres container");
        let cycle = db.seed_cycle("2025-1").await.unwrap();
        let career = db
            .seed_career(StringFixtures::career(), StringFixtures::area())
            .await
            .unwrap();
        let admission = db.seed_admission(StringFixtures::admission()).await.unwrap();

        let adapter = PostgresLedgerAdapter::new(db.pool().clone());
        assert_eq!(adapter.adapter_type(), AdapterType::Internal);

        let service = LedgerService::new(
            Arc::new(adapter),
            Arc::new(TemporalFixtures::clock()),
            LedgerSettings::default(),
        )
        .unwrap();

        PgWorld { db, service: Arc::new(service), cycle, career, admission }
    }

    impl PgWorld {
        fn plan(&self, student: core_kernel::StudentId) -> EnrollmentPlanRequestBuilder {
            EnrollmentPlanRequestBuilder::new(student, self.cycle, self.career, self.admission)
        }
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_enrollment_plan_is_persisted() {
        let world = pg_world().await;
        let student = world.db.seed_student("Juan", "Perez").await.unwrap();

        let plan = world.service.create_enrollment_plan(world.plan(student).build()).await.unwrap();
        assert_eq!(plan.code, StringFixtures::first_code());

        let stored = world.service.receivables_for_enrollment(plan.enrollment.id).await.unwrap();
        assert_eq!(stored.len(), 4);
        assert_ledger_consistent(&stored);
        assert_eq!(world.service.outstanding_debt(student).await.unwrap(), Money::new(dec!(950)));

        let duplicate = world.service.create_enrollment_plan(world.plan(student).build()).await;
        assert!(matches!(duplicate, Err(LedgerError::Conflict { .. })));
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_waterfall_and_reversal_round_trip() {
        let world = pg_world().await;
        let student = world.db.seed_student("Ana", "Quispe").await.unwrap();
        let plan = world
            .service
            .create_enrollment_plan(world.plan(student).initial_payment(dec!(0)).build())
            .await
            .unwrap();
        let first = plan.receivables[1].id;
        let second = plan.receivables[2].id;

        let payment = world
            .service
            .record_payment(PaymentRequestBuilder::new(first, dec!(400)).build())
            .await
            .unwrap();
        assert_receivable(&world.service.receivable(first).await.unwrap(), dec!(0), ReceivableStatus::Paid);

        // Carnet (due today) takes 50 before installment 2
        assert_receivable(&world.service.receivable(second).await.unwrap(), dec!(316.66), ReceivableStatus::Pending);

        let overpay = world
            .service
            .record_payment(PaymentRequestBuilder::new(second, dec!(10000)).build())
            .await;
        assert!(matches!(overpay, Err(LedgerError::Overpayment { .. })));

        world.service.cancel_payment(payment.id).await.unwrap();
        assert_receivable(&world.service.receivable(first).await.unwrap(), dec!(333.33), ReceivableStatus::Pending);

        let twice = world.service.cancel_payment(payment.id).await;
        assert!(matches!(twice, Err(LedgerError::AlreadyVoid { .. })));
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_void_enrollment_ledger_cascades() {
        let world = pg_world().await;
        let student = world.db.seed_student("Luis", "Mamani").await.unwrap();
        let plan = world.service.create_enrollment_plan(world.plan(student).build()).await.unwrap();

        let summary = world.service.void_enrollment_ledger(plan.enrollment.id).await.unwrap();
        assert_eq!(summary.receivables_voided, 4);
        assert_eq!(summary.payments_voided, 1);
        assert_all_void(&world.service.payments_for_student(student).await.unwrap());

        let again = world.service.void_enrollment_ledger(plan.enrollment.id).await;
        assert!(matches!(again, Err(LedgerError::AlreadyVoid { .. })));
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_concurrent_enrollments_get_distinct_sequential_codes() {
        let world = Arc::new(pg_world().await);

        let mut students = Vec::new();
        for _ in 0..6 {
            students.push(world.db.seed_student("Juan", "Perez").await.unwrap());
        }

        let mut handles = Vec::new();
        for student in students {
            let world = Arc::clone(&world);
            handles.push(tokio::spawn(async move {
                world.service.create_enrollment_plan(world.plan(student).build()).await
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().unwrap().code);
        }
        codes.sort();

        let expected: Vec<String> = (1..=6).map(|n| format!("2025-I-Engineering-JUPE-{:03}", n)).collect();
        assert_eq!(codes, expected);
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_concurrent_payments_never_overdraw() {
        let world = Arc::new(pg_world().await);
        let student = world.db.seed_student("Rosa", "Flores").await.unwrap();
        let plan = world
            .service
            .create_enrollment_plan(world.plan(student).initial_payment(dec!(0)).build())
            .await
            .unwrap();
        let target = plan.receivables[1].id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let world = Arc::clone(&world);
            handles.push(tokio::spawn(async move {
                world
                    .service
                    .record_payment(PaymentRequestBuilder::new(target, dec!(200)).build())
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(LedgerError::Overpayment { .. }) | Err(LedgerError::AlreadyPaid(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        // 1050 of debt fits five payments of 200
        assert_eq!(accepted, 5);
        assert_ledger_consistent(&world.service.receivables_for_student(student).await.unwrap());
        assert_eq!(world.service.outstanding_debt(student).await.unwrap(), Money::new(dec!(50)));
    }
    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_receivables_for_code_and_payment_edits() {
        let world = pg_world().await;
        let student = world.db.seed_student("Carla", "Rojas").await.unwrap();
        let plan = world.service.create_enrollment_plan(world.plan(student).build()).await.unwrap();
        world
            .service
            .create_receivable(
                NewReceivableBuilder::new(student, dec!(30))
                    .concept(format!("Certificate - {}", plan.code))
                    .build(),
            )
            .await
            .unwrap();

        let rows = world.service.receivables_for_code(&plan.code).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.enrollment_id == Some(plan.enrollment.id)));
        assert!(rows.windows(2).all(|w| w[0].due_date <= w[1].due_date));
        assert!(world.service.receivables_for_code("NO-SUCH-CODE-001").await.unwrap().is_empty());

        let initial = plan.payments[0].id;
        let edited = world
            .service
            .update_payment(initial, PaymentUpdate {
                invoice_number: Some("B001-0042".to_string()),
                notes: Some("printed receipt".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(world.service.payment(initial).await.unwrap(), edited);
        assert_eq!(edited.amount_paid, Money::new(dec!(100)));

        world.service.cancel_payment(initial).await.unwrap();
        let after_void = world
            .service
            .update_payment(initial, PaymentUpdate { notes: Some("late".to_string()), ..Default::default() })
            .await;
        assert!(matches!(after_void, Err(LedgerError::AlreadyVoid { .. })));
        assert_eq!(world.service.payment(initial).await.unwrap().notes.as_deref(), Some("printed receipt"));
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_over_limit_amount_is_rejected_before_the_database() {
        let world = pg_world().await;
        let student = world.db.seed_student("Pedro", "Huaman").await.unwrap();

        let err = world
            .service
            .create_receivable(NewReceivableBuilder::new(student, dec!(10000000000)).build())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));

        let r = world
            .service
            .create_receivable(NewReceivableBuilder::new(student, dec!(9999999999.99)).build())
            .await
            .unwrap();
        let err = world
            .service
            .record_payment(PaymentRequestBuilder::new(r.id, dec!(50000000000000000000000000000)).build())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        assert_eq!(world.service.outstanding_debt(student).await.unwrap(), Money::new(dec!(9999999999.99)));
    }

    #[tokio::test]
    #[ignore = "needs Docker"]
    async fn test_racing_duplicate_enrollments_name_the_collision() {
        let world = Arc::new(pg_world().await);
        let student = world.db.seed_student("Elena", "Vargas").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let world = Arc::clone(&world);
            handles.push(tokio::spawn(async move {
                world.service.create_enrollment_plan(world.plan(student).build()).await
            }));
        }

        let mut winners = Vec::new();
        let mut conflict_keys = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(plan) => winners.push(plan.enrollment.id.to_string()),
                Err(LedgerError::Conflict { key, .. }) => conflict_keys.push(key),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(conflict_keys.len(), 1);
        // The loser either saw the committed enrollment or hit the partial index
        assert!(conflict_keys[0] == winners[0] || conflict_keys[0] == "enrollments_active_key");
    }
}
