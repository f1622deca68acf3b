//! Input validation applied before anything is submitted to the backend.
//! Every failure carries a stable `VAL_*` code for the UI and error logs.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref REGISTRATION_RE: Regex = Regex::new(r"^\d{4}/\d{6}/\d{2}$").unwrap();
    static ref TAX_NUMBER_RE: Regex = Regex::new(r"^\d{10}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^(\+27|0)\d{9}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    fn for_field(field: &str, suffix: &str, message: String) -> Self {
        Self::new(format!("VAL_{}_{}", field_code(field), suffix), message)
    }
}

pub type ValidationResult = Result<(), ValidationError>;

fn field_code(field: &str) -> String {
    field.trim().to_uppercase().replace(' ', "_")
}

/// Required text of at least `min_len` characters after trimming
pub fn text(value: &str, min_len: usize, field: &str) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::for_field(field, "EMPTY", format!("{} is required.", field)));
    }
    if trimmed.chars().count() < min_len {
        return Err(ValidationError::for_field(
            field,
            "SHORT",
            format!("{} must be at least {} characters.", field, min_len),
        ));
    }
    Ok(())
}

/// A date that is today or later
pub fn future_date(value: &str, field: &str, today: NaiveDate) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::for_field(field, "EMPTY", format!("{} is required.", field)));
    }
    let Some(date) = tender_types::dates::parse_date(value) else {
        return Err(ValidationError::for_field(
            field,
            "INVALID",
            format!("{} is not a valid date.", field),
        ));
    };
    if date < today {
        return Err(ValidationError::for_field(
            field,
            "PAST",
            format!("{} cannot be in the past.", field),
        ));
    }
    Ok(())
}

/// A number within `[min, max]`
pub fn number(value: &str, min: f64, max: f64, field: &str) -> ValidationResult {
    let Ok(n) = value.trim().parse::<f64>() else {
        return Err(ValidationError::for_field(field, "NAN", format!("{} must be a number.", field)));
    };
    if n.is_nan() {
        return Err(ValidationError::for_field(field, "NAN", format!("{} must be a number.", field)));
    }
    if n < min || n > max {
        return Err(ValidationError::for_field(
            field,
            "RANGE",
            format!("{} must be between {} and {}.", field, min, max),
        ));
    }
    Ok(())
}

/// South African company registration number, `YYYY/NNNNNN/NN`
pub fn registration_number(value: &str) -> ValidationResult {
    if value.is_empty() {
        return Err(ValidationError::new("VAL_REG_EMPTY", "Registration number is required"));
    }
    if !REGISTRATION_RE.is_match(value) {
        return Err(ValidationError::new("VAL_REG_FORMAT", "Format must be YYYY/NNNNNN/NN"));
    }
    Ok(())
}

/// Ten-digit tax reference number
pub fn tax_number(value: &str) -> ValidationResult {
    if value.is_empty() {
        return Err(ValidationError::new("VAL_TAX_EMPTY", "Tax number is required"));
    }
    if !TAX_NUMBER_RE.is_match(value) {
        return Err(ValidationError::new("VAL_TAX_FORMAT", "Tax number must be 10 digits"));
    }
    Ok(())
}

/// `+27` or `0` followed by nine digits; whitespace is ignored
pub fn phone(value: &str) -> ValidationResult {
    if value.is_empty() {
        return Err(ValidationError::new("VAL_PHONE_EMPTY", "Phone number is required"));
    }
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if !PHONE_RE.is_match(&compact) {
        return Err(ValidationError::new(
            "VAL_PHONE_FORMAT",
            "Invalid phone number format (e.g. 0821234567)",
        ));
    }
    Ok(())
}
