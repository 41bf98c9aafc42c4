//! supasurvey-core — schema-driven survey forms and scoring.
//!
//! A survey schema ([`model::SchemaTree`]) is read from a flat table or a
//! JSON document, bound to submitted answers as typed forms, and rolled up
//! into completion percentages and decimal scores per question set, section
//! and response.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod field;
pub mod form;
pub mod memory;
pub mod model;
pub mod report;
pub mod scoring;
pub mod store;
pub mod table;
pub mod traits;
pub mod value;

pub use aggregate::{Completion, ScoreAggregator, ScoreSummary};
pub use error::{SchemaParseError, SurveyError, ValidationFailure, VerifierScoreError};
pub use form::{bind, BoundFormSet, ResponseForm, UnknownTypePolicy};
pub use model::{Answer, AnswerType, QuestionSet, SchemaTree, Section};
pub use store::SchemaStore;
