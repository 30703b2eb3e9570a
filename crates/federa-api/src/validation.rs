//! Input validation for admin requests

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ApiError;

pub const MAX_POOL_NAME_LENGTH: usize = 128;

/// Pool names become the issuer path segment
static POOL_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

/// First path segments owned by the broker itself
const RESERVED_SEGMENTS: [&str; 5] = ["logout", "error", "health", "resources", ".well-known"];

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Validation result
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Input validator
#[derive(Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and return result
    pub fn validate(self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    pub fn error(&mut self, field: &str, message: &str) -> &mut Self {
        self.errors.push(ValidationError::new(field, message));
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, "is required");
        }
        self
    }

    pub fn pool_name(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.error(field, "is required");
        } else if value.len() > MAX_POOL_NAME_LENGTH {
            self.error(field, "is too long");
        } else if !POOL_NAME_REGEX.is_match(value) {
            self.error(
                field,
                "may only contain letters, digits, '-' and '_' and must start with a letter or digit",
            );
        } else if RESERVED_SEGMENTS
            .iter()
            .any(|r| r.eq_ignore_ascii_case(value))
        {
            self.error(field, "is reserved");
        }
        self
    }
}

impl From<Vec<ValidationError>> for ApiError {
    fn from(errors: Vec<ValidationError>) -> Self {
        let description = errors
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        ApiError::invalid_request(description)
    }
}
