//! Field validators shared by the request types

use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::ValidationError;

use core_kernel::money::MONEY_SCALE;
use core_kernel::Money;

fn at_most_cents(value: &Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > MONEY_SCALE {
        let mut err = ValidationError::new("too_precise");
        err.message = Some(Cow::Owned(format!("{} has more than two decimal places", value)));
        return Err(err);
    }
    within_limit(value)
}

fn within_limit(value: &Decimal) -> Result<(), ValidationError> {
    let max = Money::max_amount().amount();
    if value.abs() > max {
        let mut err = ValidationError::new("too_large");
        err.message = Some(Cow::Owned(format!("{} exceeds the maximum amount {}", value, max)));
        return Err(err);
    }
    Ok(())
}

/// Zero or more, in whole cents
pub(crate) fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("negative");
        err.message = Some(Cow::Owned(format!("{} must not be negative", value)));
        return Err(err);
    }
    at_most_cents(value)
}

/// Strictly more than zero, in whole cents
pub(crate) fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() || value.is_sign_negative() {
        let mut err = ValidationError::new("not_positive");
        err.message = Some(Cow::Owned(format!("{} must be greater than zero", value)));
        return Err(err);
    }
    at_most_cents(value)
}

/// Rejects strings that are blank once trimmed
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::Borrowed("must not be blank"));
        return Err(err);
    }
    Ok(())
}
