//! Configuration validation utilities

use std::fmt;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Value is required but missing
    Required {
        /// Field name
        field: String,
    },
    /// Value is out of acceptable range
    OutOfRange {
        /// Field name
        field: String,
        /// Inclusive lower bound
        min: Option<u64>,
        /// Inclusive upper bound
        max: Option<u64>,
        /// Value found
        actual: u64,
    },
    /// Value format is invalid
    InvalidFormat {
        /// Field name
        field: String,
        /// Description of the accepted shape
        expected: String,
        /// Value found
        actual: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required { field } => {
                write!(f, "Field '{field}' is required but missing")
            }
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => {
                let range_desc = match (min, max) {
                    (Some(min), Some(max)) => format!("between {min} and {max}"),
                    (Some(min), None) => format!("at least {min}"),
                    (None, Some(max)) => format!("at most {max}"),
                    (None, None) => "in valid range".to_string(),
                };
                write!(f, "Field '{field}' must be {range_desc} (got {actual})")
            }
            ValidationError::InvalidFormat {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Field '{field}' has invalid format. Expected: {expected}, got: {actual}"
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Accumulates validation failures so every problem is reported at once.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that a string is not blank
    pub fn non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(ValidationError::Required {
                field: field.to_string(),
            });
        }
        self
    }

    /// Validate that a number is within range
    pub fn range(
        &mut self,
        field: &str,
        value: u64,
        min: Option<u64>,
        max: Option<u64>,
    ) -> &mut Self {
        let below = min.is_some_and(|m| value < m);
        let above = max.is_some_and(|m| value > m);
        if below || above {
            self.errors.push(ValidationError::OutOfRange {
                field: field.to_string(),
                min,
                max,
                actual: value,
            });
        }
        self
    }

    /// Validate a string with a predicate, recording the expected shape on failure
    pub fn format<F>(&mut self, field: &str, value: &str, expected: &str, check: F) -> &mut Self
    where
        F: FnOnce(&str) -> bool,
    {
        if !check(value) {
            self.errors.push(ValidationError::InvalidFormat {
                field: field.to_string(),
                expected: expected.to_string(),
                actual: value.to_string(),
            });
        }
        self
    }

    /// Finish validation, returning every accumulated error
    pub fn finish(&mut self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}
