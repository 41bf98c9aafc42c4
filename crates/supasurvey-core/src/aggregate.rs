//! Completion and score rollups.
//!
//! Question-set figures come from binding the schema to the stored
//! instances. Sections and responses sum their children's scores and take
//! the mean of their children's completion. Nothing is cached: every call
//! reads a fresh snapshot from the [`ResponseStore`].

use std::fmt;

use indexmap::IndexSet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{SurveyError, VerifierScoreError};
use crate::form::{bind, BoundFormSet, UnknownTypePolicy};
use crate::model::{QuestionSet, SchemaTree, Section};
use crate::scoring::{clamp_to_max, quantize, quantize_score, SCORE_PLACES};
use crate::traits::{OccurrenceKey, ResponseRecord, ResponseStore};
use crate::value::FormData;

/// Completion places per level.
pub const QUESTIONSET_COMPLETION_PLACES: u32 = 2;
pub const SECTION_COMPLETION_PLACES: u32 = 3;
pub const RESPONSE_COMPLETION_PLACES: u32 = 0;

const NOT_APPLICABLE: &str = "N/A";

/// A completion percentage, or `N/A` when nothing can be completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Completion {
    Percent(Decimal),
    #[default]
    NotApplicable,
}

impl Completion {
    pub fn percent(&self) -> Option<Decimal> {
        match self {
            Completion::Percent(p) => Some(*p),
            Completion::NotApplicable => None,
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Completion::Percent(_))
    }

    /// `"75%"`, or `"N/A"` with no unit.
    pub fn with_unit(&self) -> String {
        match self {
            Completion::Percent(p) => format!("{p}%"),
            Completion::NotApplicable => NOT_APPLICABLE.to_string(),
        }
    }

    /// `answered / total * 100`, or `N/A` when `total` is zero.
    pub fn ratio(answered: usize, total: usize, places: u32) -> Self {
        if total == 0 {
            return Completion::NotApplicable;
        }
        let percent = Decimal::from(answered) * Decimal::ONE_HUNDRED / Decimal::from(total);
        Completion::Percent(quantize(percent, places))
    }

    /// Mean of the applicable completions; `N/A` when there are none.
    pub fn mean<I>(items: I, places: u32) -> Self
    where
        I: IntoIterator<Item = Completion>,
    {
        let percents: Vec<Decimal> = items.into_iter().filter_map(|c| c.percent()).collect();
        if percents.is_empty() {
            return Completion::NotApplicable;
        }
        let total: Decimal = percents.iter().copied().sum();
        Completion::Percent(quantize(total / Decimal::from(percents.len()), places))
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Percent(p) => write!(f, "{p}"),
            Completion::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl From<Completion> for String {
    fn from(value: Completion) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Completion {
    type Error = rust_decimal::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim() == NOT_APPLICABLE {
            Ok(Completion::NotApplicable)
        } else {
            value.trim().parse().map(Completion::Percent)
        }
    }
}

/// Score figures cached on a [`ResponseRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    #[serde(default)]
    pub completion: Completion,
    #[serde(default)]
    pub max_score: Decimal,
    #[serde(default)]
    pub computed_score: Decimal,
}

/// Read API shared by every rollup level.
pub trait ScoreSummary {
    fn completion(&self) -> Completion;

    fn max_score(&self) -> Decimal;

    /// Never above [`max_score`](ScoreSummary::max_score).
    fn computed_score(&self) -> Decimal;

    fn verified_score(&self) -> Option<Decimal>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSetScore {
    pub questionset: u32,
    pub title: String,
    pub instances: usize,
    pub completion: Completion,
    pub max_score: Decimal,
    pub computed_score: Decimal,
    pub verified_score: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: u32,
    pub display: String,
    pub title: String,
    pub questionsets: Vec<QuestionSetScore>,
    pub completion: Completion,
    pub max_score: Decimal,
    pub computed_score: Decimal,
    pub verified_score: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseScore {
    pub response: String,
    pub sections: Vec<SectionScore>,
    pub completion: Completion,
    pub max_score: Decimal,
    pub computed_score: Decimal,
    pub verified_score: Option<Decimal>,
}

macro_rules! impl_score_summary {
    ($($ty:ty),*) => {
        $(impl ScoreSummary for $ty {
            fn completion(&self) -> Completion {
                self.completion
            }

            fn max_score(&self) -> Decimal {
                self.max_score
            }

            fn computed_score(&self) -> Decimal {
                self.computed_score
            }

            fn verified_score(&self) -> Option<Decimal> {
                self.verified_score
            }
        })*
    };
}

impl_score_summary!(QuestionSetScore, SectionScore, ResponseScore);

/// Sum of the verified scores present, `None` when no child has one.
fn sum_verified<I>(scores: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Option<Decimal>>,
{
    scores
        .into_iter()
        .flatten()
        .reduce(|a, b| a + b)
        .map(quantize_score)
}

/// Computes rollups for one schema.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator<'a> {
    tree: &'a SchemaTree,
    policy: UnknownTypePolicy,
}

impl<'a> ScoreAggregator<'a> {
    pub fn new(tree: &'a SchemaTree, policy: UnknownTypePolicy) -> Self {
        Self { tree, policy }
    }

    pub fn tree(&self) -> &'a SchemaTree {
        self.tree
    }

    fn bind(&self, questionset: &QuestionSet, instances: &[FormData]) -> Result<BoundFormSet, SurveyError> {
        bind(questionset, instances.to_vec(), self.policy)
    }

    /// Distinct answered scorable fields across all instances, as a share of
    /// the scorable fields.
    pub fn completion_for_questionset(
        &self,
        questionset: &QuestionSet,
        instances: &[FormData],
    ) -> Result<Completion, SurveyError> {
        let forms = self.bind(questionset, instances)?;
        let total = forms.forms().first().map_or(0, |f| f.scorable_count());
        let answered: IndexSet<&str> = forms.forms().iter().flat_map(|f| f.answered()).collect();
        Ok(Completion::ratio(answered.len(), total, QUESTIONSET_COMPLETION_PLACES))
    }

    /// Sum of effective field maximums for one instance.
    pub fn max_score_for_questionset(&self, questionset: &QuestionSet) -> Result<Decimal, SurveyError> {
        let forms = self.bind(questionset, &[])?;
        Ok(quantize_score(forms.get_max_score()))
    }

    /// Sum of field scores over every instance, clamped to the max. A set
    /// with no stored instances scores zero.
    pub fn computed_score_for_questionset(
        &self,
        questionset: &QuestionSet,
        instances: &[FormData],
    ) -> Result<Decimal, SurveyError> {
        let max = self.max_score_for_questionset(questionset)?;
        if instances.is_empty() {
            return Ok(Decimal::ZERO);
        }
        let computed = self.bind(questionset, instances)?.get_score();
        Ok(clamp_to_max(computed, max))
    }

    /// Score state for one question set's instances.
    pub fn state_for_questionset(
        &self,
        questionset: &QuestionSet,
        instances: &[FormData],
    ) -> Result<ScoreState, SurveyError> {
        Ok(ScoreState {
            completion: self.completion_for_questionset(questionset, instances)?,
            max_score: self.max_score_for_questionset(questionset)?,
            computed_score: self.computed_score_for_questionset(questionset, instances)?,
        })
    }

    fn score_questionset(
        &self,
        questionset: &QuestionSet,
        record: Option<&ResponseRecord>,
    ) -> Result<QuestionSetScore, SurveyError> {
        let instances = record.map_or(&[][..], |r| r.instances.as_slice());
        let state = self.state_for_questionset(questionset, instances)?;
        Ok(QuestionSetScore {
            questionset: questionset.id,
            title: questionset.title.clone(),
            instances: instances.len(),
            completion: state.completion,
            max_score: state.max_score,
            computed_score: state.computed_score,
            verified_score: record.and_then(|r| r.verified_score),
        })
    }

    fn score_section_tree(
        &self,
        section: &Section,
        store: &dyn ResponseStore,
        response: &str,
    ) -> Result<SectionScore, SurveyError> {
        let questionsets = section
            .questionsets
            .values()
            .map(|qs| {
                let record = store.get(&OccurrenceKey::new(response, qs.id))?;
                self.score_questionset(qs, record.as_ref())
            })
            .collect::<Result<Vec<_>, SurveyError>>()?;

        let completion = Completion::mean(
            questionsets.iter().map(|q| q.completion),
            SECTION_COMPLETION_PLACES,
        );
        tracing::debug!(section = section.id, %completion, "scored section");
        Ok(SectionScore {
            section: section.id,
            display: section.display.clone(),
            title: section.title.clone(),
            completion,
            max_score: quantize_score(questionsets.iter().map(|q| q.max_score).sum()),
            computed_score: quantize_score(questionsets.iter().map(|q| q.computed_score).sum()),
            verified_score: sum_verified(questionsets.iter().map(|q| q.verified_score)),
            questionsets,
        })
    }

    /// Rollup for one question set of a response.
    pub fn score_questionset_of(
        &self,
        store: &dyn ResponseStore,
        response: &str,
        questionset_id: u32,
    ) -> Result<QuestionSetScore, SurveyError> {
        let (_, questionset) = self
            .tree
            .find_questionset(questionset_id)
            .ok_or(SurveyError::UnknownQuestionSet(questionset_id))?;
        let record = store.get(&OccurrenceKey::new(response, questionset_id))?;
        self.score_questionset(questionset, record.as_ref())
    }

    /// Rollup for one section of a response.
    pub fn score_section(
        &self,
        store: &dyn ResponseStore,
        response: &str,
        section_id: u32,
    ) -> Result<SectionScore, SurveyError> {
        let section = self
            .tree
            .sections
            .get(&section_id)
            .ok_or(SurveyError::UnknownSection(section_id))?;
        self.score_section_tree(section, store, response)
    }

    /// Rollup for a whole response.
    pub fn score_response(
        &self,
        store: &dyn ResponseStore,
        response: &str,
    ) -> Result<ResponseScore, SurveyError> {
        let sections = self
            .tree
            .sections
            .values()
            .map(|s| self.score_section_tree(s, store, response))
            .collect::<Result<Vec<_>, SurveyError>>()?;

        let completion = Completion::mean(
            sections.iter().map(|s| s.completion),
            RESPONSE_COMPLETION_PLACES,
        );
        tracing::debug!(%response, %completion, "scored response");
        Ok(ResponseScore {
            response: response.to_string(),
            completion,
            max_score: quantize_score(sections.iter().map(|s| s.max_score).sum()),
            computed_score: quantize_score(sections.iter().map(|s| s.computed_score).sum()),
            verified_score: sum_verified(sections.iter().map(|s| s.verified_score)),
            sections,
        })
    }

    /// Recompute the score state stored on `record`.
    pub fn refresh(&self, record: &mut ResponseRecord) -> Result<(), SurveyError> {
        let questionset_id = record.key.questionset;
        let (_, questionset) = self
            .tree
            .find_questionset(questionset_id)
            .ok_or(SurveyError::UnknownQuestionSet(questionset_id))?;
        record.score = self.state_for_questionset(questionset, &record.instances)?;
        tracing::debug!(
            key = %record.key,
            completion = %record.score.completion,
            computed = %record.score.computed_score,
            "refreshed score state"
        );
        Ok(())
    }

    /// Validate a verifier score against a question set's max.
    pub fn verify(&self, questionset_id: u32, input: &str) -> Result<Decimal, SurveyError> {
        let (_, questionset) = self
            .tree
            .find_questionset(questionset_id)
            .ok_or(SurveyError::UnknownQuestionSet(questionset_id))?;
        let max = self.max_score_for_questionset(questionset)?;
        Ok(validate_verified_score(input, max)?)
    }

    /// Validate and record a verifier score.
    pub fn set_verified_score(&self, record: &mut ResponseRecord, input: &str) -> Result<Decimal, SurveyError> {
        let value = self.verify(record.key.questionset, input)?;
        record.verified_score = Some(value);
        Ok(value)
    }
}

/// Check a human-entered verifier score: a number with at most
/// [`SCORE_PLACES`] decimal places between zero and `max`.
pub fn validate_verified_score(input: &str, max: Decimal) -> Result<Decimal, VerifierScoreError> {
    let value: Decimal = input
        .trim()
        .parse()
        .map_err(|_| VerifierScoreError::NotNumeric(input.to_string()))?;
    if value.scale() > SCORE_PLACES {
        return Err(VerifierScoreError::Precision {
            value,
            max_places: SCORE_PLACES,
        });
    }
    if value.is_sign_negative() && !value.is_zero() || value > max {
        return Err(VerifierScoreError::OutOfRange { value, max });
    }
    Ok(value)
}
