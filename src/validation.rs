//! JSON body extraction with field-level validation messages.
//!
//! Request DTOs derive [`Validate`] for their rules and implement
//! [`FieldTags`] to declare their wire field names in the order messages
//! should be reported.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::ApiError;

/// Static per-field metadata for a request body.
pub trait FieldTags {
    /// JSON field names, in reporting order.
    const FIELDS: &'static [&'static str];
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

fn describe(field: &str, err: &ValidationError) -> String {
    let bound = |name: &str| err.params.get(name).and_then(|v| v.as_u64());
    match err.code.as_ref() {
        "required" => format!("{field} is required"),
        "email" => format!("{field} must be a valid email address"),
        "length" => {
            let len = err
                .params
                .get("value")
                .and_then(|v| v.as_str())
                .map(|s| s.chars().count() as u64);
            match (len, bound("min"), bound("max")) {
                (Some(len), Some(min), _) if len < min => {
                    format!("{field} must be at least {min} characters")
                }
                (_, _, Some(max)) => format!("{field} must not be longer than {max} characters"),
                (_, Some(min), None) => format!("{field} must be at least {min} characters"),
                _ => format!("{field} is invalid"),
            }
        }
        _ => format!("{field} is invalid"),
    }
}

/// One message per failing field, ordered by `T::FIELDS`, joined with ", ".
pub fn format_validation_errors<T: FieldTags>(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    T::FIELDS
        .iter()
        .filter_map(|field| {
            field_errors
                .get(*field)
                .and_then(|errs| errs.first())
                .map(|err| describe(field, err))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Json<T>` that also runs `T`'s validation rules before the handler sees it.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + FieldTags,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| ApiError::Validation(format_validation_errors::<T>(&errors)))?;
        Ok(Self(value))
    }
}
