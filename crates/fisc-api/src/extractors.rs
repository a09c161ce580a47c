//! # Custom Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs and helpers that turn axum
//! rejections into [`AppError`] bodies.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use crate::error::AppError;

/// Request types with business rules beyond what serde checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Extract query parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Reason(String);

    impl Validate for Reason {
        fn validate(&self) -> Result<(), String> {
            if self.0.trim().is_empty() {
                return Err("reason must not be empty".into());
            }
            Ok(())
        }
    }

    #[test]
    fn validation_failure_is_a_validation_error() {
        let err = extract_validated_json(Ok(Json(Reason("  ".into())))).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("reason")));
        assert!(extract_validated_json(Ok(Json(Reason("duplicate".into())))).is_ok());
    }
}
