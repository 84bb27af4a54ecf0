//! Unit tests for the Money module
//!
//! Tests cover creation, input precision checks, arithmetic,
//! installment splitting, display and serialization.

use core_kernel::{Money, MoneyError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_keeps_two_decimal_places() {
        let m = Money::new(dec!(100.50));
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_new_rounds_to_cents() {
        assert_eq!(Money::new(dec!(333.333333)).amount(), dec!(333.33));
        assert_eq!(Money::new(dec!(0.005)).amount(), dec!(0.01));
    }

    #[test]
    fn test_from_minor_converts_cents_correctly() {
        let m = Money::from_minor(10050);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_try_new_accepts_trailing_zeros() {
        let m = Money::try_new(dec!(12.5000)).unwrap();
        assert_eq!(m, Money::new(dec!(12.50)));
    }

    #[test]
    fn test_try_new_rejects_fractions_of_a_cent() {
        let result = Money::try_new(dec!(0.001));
        assert!(matches!(result, Err(MoneyError::TooPrecise(_))));
    }

    #[test]
    fn test_zero_and_default_agree() {
        assert_eq!(Money::zero(), Money::default());
        assert!(Money::zero().is_zero());
    }
}

mod predicates {
    use super::*;

    #[test]
    fn test_is_positive() {
        assert!(Money::new(dec!(0.01)).is_positive());
        assert!(!Money::zero().is_positive());
        assert!(!Money::new(dec!(-1)).is_positive());
    }

    #[test]
    fn test_is_negative() {
        assert!(Money::new(dec!(-0.01)).is_negative());
        assert!(!Money::zero().is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add() {
        let total = Money::new(dec!(100.10)).checked_add(&Money::new(dec!(0.90))).unwrap();
        assert_eq!(total.amount(), dec!(101.00));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let diff = Money::new(dec!(50)).checked_sub(&Money::new(dec!(80))).unwrap();
        assert_eq!(diff.amount(), dec!(-30));
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.checked_add(&Money::new(Decimal::MAX)), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_operators() {
        let a = Money::new(dec!(10.25));
        let b = Money::new(dec!(0.75));
        assert_eq!((a + b).amount(), dec!(11.00));
        assert_eq!((a - b).amount(), dec!(9.50));
    }

    #[test]
    fn test_divide_by_zero_error() {
        assert_eq!(Money::new(dec!(1)).divide(Decimal::ZERO), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_sum_of_references() {
        let parts = [Money::new(dec!(1.10)), Money::new(dec!(2.20))];
        assert_eq!(parts.iter().sum::<Money>().amount(), dec!(3.30));
    }

    #[test]
    fn test_ordering_is_by_amount() {
        let small = Money::new(dec!(99.99));
        let large = Money::new(dec!(100));
        assert!(small < large);
        assert_eq!(small.min(large), small);
    }
}

mod splitting {
    use super::*;

    #[test]
    fn test_split_single_part_is_identity() {
        let m = Money::new(dec!(1000));
        assert_eq!(m.split(1).unwrap(), vec![m]);
    }

    #[test]
    fn test_split_even_amount() {
        let parts = Money::new(dec!(900)).split(3).unwrap();
        assert!(parts.iter().all(|p| p.amount() == dec!(300)));
    }

    #[test]
    fn test_split_remainder_goes_to_last() {
        let parts = Money::new(dec!(100)).split(3).unwrap();
        assert_eq!(parts[0].amount(), dec!(33.33));
        assert_eq!(parts[1].amount(), dec!(33.33));
        assert_eq!(parts[2].amount(), dec!(33.34));
    }

    #[test]
    fn test_split_rounding_up_makes_last_smaller() {
        // 200 / 3 = 66.666.. rounds up to 66.67, so the last part is 66.66
        let parts = Money::new(dec!(200)).split(3).unwrap();
        assert_eq!(parts[0].amount(), dec!(66.67));
        assert_eq!(parts[2].amount(), dec!(66.66));
        assert_eq!(parts.iter().sum::<Money>().amount(), dec!(200));
    }

    #[test]
    fn test_split_zero_parts_error() {
        assert!(matches!(
            Money::new(dec!(1)).split(0),
            Err(MoneyError::InvalidAmount(_))
        ));
    }
}

mod display_and_serde {
    use super::*;

    #[test]
    fn test_display_always_two_decimals() {
        assert_eq!(Money::new(dec!(5)).to_string(), "5.00");
        assert_eq!(Money::new(dec!(233.3)).to_string(), "233.30");
    }

    #[test]
    fn test_json_roundtrip() {
        let original = Money::new(dec!(333.34));
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_deserialize_rejects_sub_cent_amount() {
        let parsed: Result<Money, _> = serde_json::from_str("\"1.005\"");
        assert!(parsed.is_err());
    }
}
