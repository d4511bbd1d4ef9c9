//! Custom `validator` rules shared by the request bodies in this module
//!
//! Struct-level rules (date ranges, weight sums) report through the
//! `__all__` key of [`validator::ValidationErrors`]; each one carries the
//! field it is about in a `field` param so the API can point at it.

use chrono::{NaiveDate, Utc};
use std::borrow::Cow;
use validator::ValidationError;

use super::is_valid_date_range;

/// Builds an error aimed at `field`, for use from schema functions
pub fn field_error(code: &'static str, field: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code).with_message(Cow::Borrowed(message));
    err.add_param(Cow::Borrowed("field"), &field);
    err
}

/// Rejects values that are empty after trimming
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Must not be blank")));
    }
    Ok(())
}

pub fn not_in_future(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > Utc::now().date_naive() {
        return Err(ValidationError::new("future_date")
            .with_message(Cow::Borrowed("Must not be in the future")));
    }
    Ok(())
}

/// Three ASCII letters, case-insensitive
pub fn currency_code(value: &str) -> Result<(), ValidationError> {
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new("currency")
            .with_message(Cow::Borrowed("Must be a three-letter ISO 4217 code")));
    }
    Ok(())
}

/// Fails on `end_field` when both dates are set and `end` precedes `start`
pub fn date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    end_field: &'static str,
) -> Result<(), ValidationError> {
    if is_valid_date_range(start, end) {
        Ok(())
    } else {
        Err(field_error("date_range", end_field, "Must not precede the start date"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Rust").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank(" \t ").is_err());
    }

    #[test]
    fn test_currency_code() {
        assert!(currency_code("usd").is_ok());
        assert!(currency_code("EUR").is_ok());
        assert!(currency_code("EURO").is_err());
        assert!(currency_code("U$D").is_err());
    }

    #[test]
    fn test_date_range_names_end_field() {
        assert!(date_range(date(2020, 1, 1), date(2021, 1, 1), "end_date").is_ok());
        assert!(date_range(None, date(2021, 1, 1), "end_date").is_ok());

        let err = date_range(date(2021, 1, 1), date(2020, 1, 1), "expires_on").unwrap_err();
        assert_eq!(err.code, "date_range");
        assert_eq!(err.params["field"], "expires_on");
    }

    #[test]
    fn test_future_date_rejected() {
        assert!(not_in_future(&NaiveDate::from_ymd_opt(1990, 5, 17).unwrap()).is_ok());
        assert!(not_in_future(&NaiveDate::from_ymd_opt(2999, 1, 1).unwrap()).is_err());
    }
}
