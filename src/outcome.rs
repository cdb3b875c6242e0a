//! Outcome - Success/Failure Container
//!
//! A success never carries error state. A failure always carries at least
//! one error message or one validation error. Contradictory construction is
//! a programming error and panics.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const GENERIC_PROPERTY: &str = "Generic";

/// A single structured validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(default = "generic_property")]
    pub property: String,
}

fn generic_property() -> String {
    GENERIC_PROPERTY.to_string()
}

impl ValidationError {
    /// Validation error not tied to a specific field.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            property: generic_property(),
        }
    }

    pub fn for_property(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Rejected combination of outcome parts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("The outcome can not be a success and have an error")]
    SuccessWithError,

    #[error("The outcome can not be a failure without specifying errors")]
    FailureWithoutError,

    #[error("A successful outcome must carry its value")]
    MissingValue,
}

/// The failure half of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    error: Option<String>,
    validation_errors: Vec<ValidationError>,
}

impl Failure {
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    /// Free-text error, or the validation messages joined with `; `.
    pub fn message(&self) -> String {
        match &self.error {
            Some(error) => error.clone(),
            None => self
                .validation_errors
                .iter()
                .map(|v| v.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for Failure {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State<T> {
    Success(T),
    Failure(Failure),
}

/// Result of a report operation: a payload on success, error state otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T = ()> {
    state: State<T>,
}

impl Outcome<()> {
    pub fn ok() -> Self {
        Self::success(())
    }
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Self {
            state: State::Success(value),
        }
    }

    /// Failure with a single free-text error.
    ///
    /// # Panics
    /// If `message` is blank: a failure must say what failed.
    pub fn fail(message: impl Into<String>) -> Self {
        let message = message.into();
        assert!(
            !message.trim().is_empty(),
            "{}",
            OutcomeError::FailureWithoutError
        );
        Self::from_failure(Failure {
            error: Some(message),
            validation_errors: vec![],
        })
    }

    /// Failure carrying structured validation errors and no top-level message.
    ///
    /// # Panics
    /// If `errors` is empty.
    pub fn validation_failed(errors: impl IntoIterator<Item = ValidationError>) -> Self {
        let validation_errors: Vec<_> = errors.into_iter().collect();
        assert!(
            !validation_errors.is_empty(),
            "{}",
            OutcomeError::FailureWithoutError
        );
        Self::from_failure(Failure {
            error: None,
            validation_errors,
        })
    }

    /// Re-type an existing failure, keeping its message and validation errors.
    pub fn from_failure(failure: Failure) -> Self {
        Self {
            state: State::Failure(failure),
        }
    }

    /// Checked construction from loose parts, for data that did not come
    /// through the constructors above (e.g. deserialized input).
    pub fn from_parts(
        is_success: bool,
        error: Option<String>,
        validation_errors: Vec<ValidationError>,
        value: Option<T>,
    ) -> Result<Self, OutcomeError> {
        let error = error.filter(|e| !e.is_empty());

        if is_success {
            if error.is_some() || !validation_errors.is_empty() {
                return Err(OutcomeError::SuccessWithError);
            }
            return value.map(Self::success).ok_or(OutcomeError::MissingValue);
        }

        if error.is_none() && validation_errors.is_empty() {
            return Err(OutcomeError::FailureWithoutError);
        }

        Ok(Self::from_failure(Failure {
            error,
            validation_errors,
        }))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, State::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            State::Success(_) => None,
            State::Failure(failure) => failure.error(),
        }
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        match &self.state {
            State::Success(_) => &[],
            State::Failure(failure) => failure.validation_errors(),
        }
    }

    /// The payload; always `None` for a failure.
    pub fn value(&self) -> Option<&T> {
        match &self.state {
            State::Success(value) => Some(value),
            State::Failure(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self.state {
            State::Success(value) => Some(value),
            State::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, Failure> {
        match self.state {
            State::Success(value) => Ok(value),
            State::Failure(failure) => Err(failure),
        }
    }

    /// User-facing text for a failure; `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        match &self.state {
            State::Success(_) => None,
            State::Failure(failure) => Some(failure.message()),
        }
    }
}

impl<T> From<Failure> for Outcome<T> {
    fn from(failure: Failure) -> Self {
        Self::from_failure(failure)
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Outcome", 4)?;
        s.serialize_field("is_success", &self.is_success())?;
        s.serialize_field("error", &self.error())?;
        s.serialize_field("validation_errors", self.validation_errors())?;
        match self.value() {
            Some(value) => s.serialize_field("value", value)?,
            None => s.skip_field("value")?,
        }
        s.end()
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct OutcomeParts<T> {
    is_success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    validation_errors: Vec<ValidationError>,
    #[serde(default = "Option::default", deserialize_with = "present")]
    value: Option<T>,
}

/// A `value` key that is present always holds `T`, even when `T` is `()`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Outcome<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = OutcomeParts::<T>::deserialize(deserializer)?;
        Outcome::from_parts(
            parts.is_success,
            parts.error,
            parts.validation_errors,
            parts.value,
        )
        .map_err(de::Error::custom)
    }
}
