//! Error types for schema parsing, form binding, and score verification.
//!
//! Schema-level errors abort the call that raised them. Field-level
//! failures ([`ValidationFailure`]) are values: scoring recovers from them
//! and form validation collects them per field.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::AnswerType;

/// A malformed flat schema row or interchange document.
#[derive(Debug, Error)]
pub enum SchemaParseError {
    /// A required column is absent or blank.
    #[error("row {row}: missing required column `{column}`")]
    MissingColumn { row: usize, column: &'static str },

    /// An id column does not hold a non-negative integer.
    #[error("row {row}: `{column}` must be an integer, got {value:?}")]
    InvalidId {
        row: usize,
        column: &'static str,
        value: String,
    },

    /// `answer_type` is present but not a known tag.
    #[error("row {row}: unknown answer type {tag:?}")]
    UnknownAnswerType { row: usize, tag: String },

    /// A score column holds something that is not a decimal.
    #[error("row {row}: `{column}` is not a decimal: {value:?}")]
    InvalidDecimal {
        row: usize,
        column: &'static str,
        value: String,
    },

    /// The JSON interchange document could not be read.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),

    /// The flat CSV document could not be read or written.
    #[error("invalid schema table: {0}")]
    Csv(#[from] csv::Error),
}

/// The factory has no field builder for this answer type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("answer type `{0}` has no field builder")]
pub struct UnsupportedAnswerType(pub AnswerType);

/// Why a single field value failed to clean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("This field is required.")]
    Required,

    #[error("Select a valid choice. {0} is not one of the available choices.")]
    InvalidChoice(String),

    /// The synthetic "Other" option was chosen without its text.
    #[error("Please specify.")]
    OtherNotSpecified,

    #[error("Enter a valid email address.")]
    InvalidEmail,

    #[error("Enter a number.")]
    InvalidNumber,

    #[error("Ensure this value is between {min} and {max}.")]
    OutOfRange { min: Decimal, max: Decimal },

    #[error("Ensure this value has at most {max} characters (it has {actual}).")]
    TooLong { max: usize, actual: usize },

    #[error("Ensure this value has at least {min} characters (it has {actual}).")]
    TooShort { min: usize, actual: usize },

    /// The submitted value has the wrong shape for the field, e.g. a list
    /// where a single choice was expected.
    #[error("Unexpected value shape for this field.")]
    WrongShape,
}

/// A human-entered verifier score that cannot be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierScoreError {
    #[error("verified score {0:?} is not a number")]
    NotNumeric(String),

    #[error("verified score {value} has more than {max_places} decimal places")]
    Precision { value: Decimal, max_places: u32 },

    #[error("verified score {value} must be between 0 and {max}")]
    OutOfRange { value: Decimal, max: Decimal },
}

/// Failure reported by a persistence or file-storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors from form binding and score aggregation.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error(transparent)]
    Schema(#[from] SchemaParseError),

    /// Raised under the strict unknown-type policy.
    #[error("field `{key}`: {source}")]
    Unsupported {
        key: String,
        #[source]
        source: UnsupportedAnswerType,
    },

    /// Raised under the strict unknown-type policy.
    #[error("field `{key}` has no answer type")]
    MissingAnswerType { key: String },

    #[error("answer `{key}` has an invalid score table: {value:?}")]
    InvalidScoreTable { key: String, value: String },

    #[error("unknown section: {0}")]
    UnknownSection(u32),

    #[error("unknown question set: {0}")]
    UnknownQuestionSet(u32),

    #[error(transparent)]
    Verifier(#[from] VerifierScoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
