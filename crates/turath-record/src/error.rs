//! Validation errors raised at the record boundary.

use thiserror::Error;

/// The first offending field found while validating a draft or record.
///
/// Validation is fail-fast: callers get exactly one error naming one field,
/// which the UI uses to jump back to the step holding that input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    Missing { field: &'static str },

    #[error("field `{field}` has unrecognized value '{value}'")]
    UnknownVariant { field: &'static str, value: String },

    #[error("field `{field}` is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("field `{field}` is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self::Missing { field }
    }

    pub fn unknown_variant(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            field,
            value: value.into(),
        }
    }

    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }

    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }

    /// Wire name of the offending field (camelCase, as the UI knows it).
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field }
            | Self::UnknownVariant { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::Malformed { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_is_reported_for_every_variant() {
        assert_eq!(ValidationError::missing("id").field(), "id");
        assert_eq!(
            ValidationError::unknown_variant("category", "X").field(),
            "category"
        );
        assert_eq!(ValidationError::out_of_range("weight", "<0").field(), "weight");
        assert_eq!(ValidationError::malformed("images", "bad").field(), "images");
    }

    #[test]
    fn test_display_mentions_field_and_value() {
        let err = ValidationError::unknown_variant("legalStatus", "stolen");
        let message = err.to_string();
        assert!(message.contains("legalStatus"));
        assert!(message.contains("stolen"));
    }
}
