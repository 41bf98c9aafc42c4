//! Field scoring and decimal quantisation.
//!
//! A [`ScoreSpec`] is attached to every scorable [`Field`](crate::field::Field).
//! Scoring is a pure function of the [`ScoreSpec`], the field kind and the cleaning
//! outcome; nothing is remembered between calls.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValidationFailure;
use crate::field::FieldKind;
use crate::value::Cleaned;

/// Decimal places kept for scores at every level.
pub const SCORE_PLACES: u32 = 3;

/// How a valid, non-empty value earns points.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreStrategy {
    /// Any valid answer earns `max_score`.
    Binary,
    /// `max_score` on exact equality with the stored value, else `min_score`.
    Correct(String),
    /// One score per choice, aligned with the field's choice list.
    ChoiceTable(Vec<Decimal>),
}

/// Score bounds plus strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSpec {
    pub min_score: Decimal,
    pub max_score: Decimal,
    pub strategy: ScoreStrategy,
}

impl ScoreSpec {
    /// A choice table wins over a correct value, which wins over binary.
    pub fn new(
        min_score: Decimal,
        max_score: Decimal,
        correct: Option<String>,
        scores: Vec<Decimal>,
    ) -> Self {
        let strategy = if !scores.is_empty() {
            ScoreStrategy::ChoiceTable(scores)
        } else if let Some(correct) = correct {
            ScoreStrategy::Correct(correct)
        } else {
            ScoreStrategy::Binary
        };
        Self {
            min_score,
            max_score,
            strategy,
        }
    }

    /// Effective maximum: the last table entry for a single choice, the sum
    /// of the table for a multiple choice, the declared max otherwise.
    pub fn max_score(&self, kind: &FieldKind) -> Decimal {
        match (&self.strategy, kind) {
            (ScoreStrategy::ChoiceTable(table), FieldKind::MultipleChoice { .. }) => {
                table.iter().copied().sum()
            }
            (ScoreStrategy::ChoiceTable(table), _) => {
                table.last().copied().unwrap_or(self.max_score)
            }
            _ => self.max_score,
        }
    }

    /// Score a cleaning outcome.
    ///
    /// Invalid and empty values earn `min_score`. A single-choice value not
    /// in the choice list (free "other" text) takes the last table entry;
    /// unmatched multi-choice selections contribute nothing.
    pub fn score(&self, kind: &FieldKind, outcome: Result<Cleaned, ValidationFailure>) -> Decimal {
        let cleaned = match outcome {
            Ok(cleaned) if !cleaned.is_empty() => cleaned,
            _ => return self.min_score,
        };

        match &self.strategy {
            ScoreStrategy::ChoiceTable(table) => {
                let choices = kind.choices();
                match &cleaned {
                    Cleaned::Choices(selected) => selected
                        .iter()
                        .filter_map(|s| choices.iter().position(|c| c == s))
                        .filter_map(|idx| table.get(idx).copied())
                        .sum(),
                    Cleaned::Text(value) => choices
                        .iter()
                        .position(|c| c == value)
                        .and_then(|idx| table.get(idx))
                        .or(table.last())
                        .copied()
                        .unwrap_or(self.min_score),
                    _ => self.min_score,
                }
            }
            ScoreStrategy::Correct(correct) => match &cleaned {
                Cleaned::Text(value) if value == correct => self.max_score,
                Cleaned::Number(n) if correct.trim().parse::<Decimal>().is_ok_and(|c| c == *n) => {
                    self.max_score
                }
                _ => self.min_score,
            },
            ScoreStrategy::Binary => self.max_score,
        }
    }
}

/// Round a score to [`SCORE_PLACES`].
pub fn quantize_score(value: Decimal) -> Decimal {
    quantize(value, SCORE_PLACES)
}

/// Round half-even to `places` decimal places.
pub fn quantize(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Quantise `computed` and clamp it so it never exceeds `max`.
pub fn clamp_to_max(computed: Decimal, max: Decimal) -> Decimal {
    let computed = quantize_score(computed);
    let max = quantize_score(max);
    if computed > max {
        tracing::debug!(%computed, %max, "computed score clamped to max");
        max
    } else {
        computed
    }
}
