//! Field factory.
//!
//! [`build`] maps an [`AnswerType`] to a typed [`Field`]: a base
//! [`FieldKind`] that owns validation, a [`Widget`] hint for the renderer,
//! an [`OutputFormat`], and an optional [`ScoreSpec`]. Every type except
//! file uploads carries a score spec.

use indexmap::IndexSet;
use rust_decimal::Decimal;
use validator::ValidateEmail;

use crate::error::{UnsupportedAnswerType, ValidationFailure};
use crate::model::{Answer, AnswerType};
use crate::scoring::ScoreSpec;
use crate::value::{Cleaned, RawValue};

/// Synthetic option appended to open choice lists.
pub const OTHER_CHOICE: &str = "Other";

/// Fixed options of a yes/no field.
pub const YES_NO_CHOICES: [&str; 2] = ["Yes", "No"];

/// Base input shape, which decides how a raw value is cleaned.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// One of N options. `open` fields also accept free text and carry the
    /// synthetic [`OTHER_CHOICE`] option.
    Choice { choices: Vec<String>, open: bool },
    /// Any subset of N options.
    MultipleChoice { choices: Vec<String> },
    Text {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Email,
    /// Decimal input, rounded to `places` when set.
    Number {
        places: Option<u32>,
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    /// References to files held by a [`FileStorage`](crate::traits::FileStorage).
    Files,
}

impl FieldKind {
    pub fn choices(&self) -> &[String] {
        match self {
            FieldKind::Choice { choices, .. } | FieldKind::MultipleChoice { choices } => choices,
            _ => &[],
        }
    }
}

/// Rendering hint passed to the [`FieldRenderer`](crate::traits::FieldRenderer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    RadioSelect,
    RadioSelectOpen,
    CheckboxSelectMultiple,
    TextInput,
    Textarea,
    EmailInput,
    NumberInput,
    FileMultiple,
}

impl Widget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Widget::RadioSelect => "radio",
            Widget::RadioSelectOpen => "radio-open",
            Widget::CheckboxSelectMultiple => "checkbox-multiple",
            Widget::TextInput => "text",
            Widget::Textarea => "textarea",
            Widget::EmailInput => "email",
            Widget::NumberInput => "number",
            Widget::FileMultiple => "file-multiple",
        }
    }
}

/// How a cleaned value is shown in listings and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    /// Multi-valued: shown as a comma list, exported pipe-joined.
    List,
}

/// Constructor arguments shared by every field type.
#[derive(Debug, Clone, Default)]
pub struct FieldArgs {
    pub label: String,
    pub initial: Option<RawValue>,
    pub required: bool,
    pub choices: Vec<String>,
    pub min_score: Option<Decimal>,
    pub max_score: Option<Decimal>,
    pub scores: Vec<Decimal>,
    pub correct: Option<String>,
}

impl FieldArgs {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Arguments for a schema answer. Fails when the score table is not a
    /// list of decimals.
    pub fn from_answer(answer: &Answer) -> Result<Self, rust_decimal::Error> {
        Ok(Self {
            label: answer.label.clone(),
            initial: None,
            required: answer.required,
            choices: answer.choices(),
            min_score: answer.minscore,
            max_score: answer.maxscore,
            scores: answer.score_table()?,
            correct: answer.correct.clone(),
        })
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn scores<I>(mut self, scores: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        self.scores = scores.into_iter().collect();
        self
    }

    pub fn bounds(mut self, min_score: Decimal, max_score: Decimal) -> Self {
        self.min_score = Some(min_score);
        self.max_score = Some(max_score);
        self
    }

    pub fn max_score(mut self, max_score: Decimal) -> Self {
        self.max_score = Some(max_score);
        self
    }

    pub fn correct(mut self, correct: impl Into<String>) -> Self {
        self.correct = Some(correct.into());
        self
    }

    pub fn initial(mut self, initial: RawValue) -> Self {
        self.initial = Some(initial);
        self
    }
}

/// A typed input field built from the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub answer_type: AnswerType,
    pub label: String,
    pub required: bool,
    pub initial: Option<RawValue>,
    pub kind: FieldKind,
    pub widget: Widget,
    pub format: OutputFormat,
    /// `None` for non-scorable fields.
    pub scoring: Option<ScoreSpec>,
}

/// Build a field for `answer_type`.
pub fn build(answer_type: AnswerType, args: FieldArgs) -> Result<Field, UnsupportedAnswerType> {
    let (kind, widget, format) = match answer_type {
        AnswerType::ChooseOne => (
            FieldKind::Choice {
                choices: args.choices.clone(),
                open: false,
            },
            Widget::RadioSelect,
            OutputFormat::Plain,
        ),
        AnswerType::ChooseOneOpen => {
            let mut choices = args.choices.clone();
            if !choices.iter().any(|c| c == OTHER_CHOICE) {
                choices.push(OTHER_CHOICE.to_string());
            }
            (
                FieldKind::Choice {
                    choices,
                    open: true,
                },
                Widget::RadioSelectOpen,
                OutputFormat::Plain,
            )
        }
        AnswerType::YesNo => (
            FieldKind::Choice {
                choices: YES_NO_CHOICES.iter().map(|c| c.to_string()).collect(),
                open: false,
            },
            Widget::RadioSelect,
            OutputFormat::Plain,
        ),
        AnswerType::ChooseMultiple => (
            FieldKind::MultipleChoice {
                choices: args.choices.clone(),
            },
            Widget::CheckboxSelectMultiple,
            OutputFormat::List,
        ),
        AnswerType::Char => (
            FieldKind::Text {
                min_length: None,
                max_length: None,
            },
            Widget::TextInput,
            OutputFormat::Plain,
        ),
        AnswerType::Text => (
            FieldKind::Text {
                min_length: None,
                max_length: None,
            },
            Widget::Textarea,
            OutputFormat::Plain,
        ),
        AnswerType::Email => (FieldKind::Email, Widget::EmailInput, OutputFormat::Plain),
        AnswerType::Numeric => (
            FieldKind::Number {
                places: None,
                min: None,
                max: None,
            },
            Widget::NumberInput,
            OutputFormat::Plain,
        ),
        AnswerType::Money => (
            FieldKind::Number {
                places: Some(2),
                min: None,
                max: None,
            },
            Widget::NumberInput,
            OutputFormat::Plain,
        ),
        AnswerType::Percentage => (
            FieldKind::Number {
                places: Some(2),
                min: Some(Decimal::ZERO),
                max: Some(Decimal::ONE_HUNDRED),
            },
            Widget::NumberInput,
            OutputFormat::Plain,
        ),
        AnswerType::FileMultiple => (FieldKind::Files, Widget::FileMultiple, OutputFormat::List),
        AnswerType::ChooseOneForEach => return Err(UnsupportedAnswerType(answer_type)),
    };

    let scoring = answer_type.is_scorable().then(|| {
        let correct = match answer_type {
            AnswerType::YesNo => args.correct.clone().or_else(|| Some(YES_NO_CHOICES[0].into())),
            _ => args.correct.clone(),
        };
        if !args.scores.is_empty() && kind.choices().is_empty() {
            tracing::warn!(
                label = %args.label,
                answer_type = %answer_type,
                "score table ignored on a field without choices"
            );
        }
        ScoreSpec::new(
            args.min_score.unwrap_or(Decimal::ZERO),
            args.max_score.unwrap_or(Decimal::ZERO),
            correct,
            if kind.choices().is_empty() {
                Vec::new()
            } else {
                args.scores.clone()
            },
        )
    });

    Ok(Field {
        answer_type,
        label: args.label,
        required: args.required,
        initial: args.initial,
        kind,
        widget,
        format,
        scoring,
    })
}

impl Field {
    /// Validate and clean a raw value.
    pub fn clean(&self, raw: &RawValue) -> Result<Cleaned, ValidationFailure> {
        if raw.is_blank() {
            return if self.required {
                Err(ValidationFailure::Required)
            } else {
                Ok(Cleaned::Empty)
            };
        }

        match &self.kind {
            FieldKind::Choice { choices, open } => clean_choice(choices, *open, raw),
            FieldKind::MultipleChoice { choices } => {
                let items: IndexSet<String> = match raw {
                    RawValue::Text(s) => IndexSet::from([s.trim().to_string()]),
                    RawValue::List(items) => items
                        .iter()
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                    _ => return Err(ValidationFailure::WrongShape),
                };
                if let Some(bad) = items.iter().find(|i| !choices.contains(i)) {
                    return Err(ValidationFailure::InvalidChoice(bad.clone()));
                }
                Ok(Cleaned::Choices(items.into_iter().collect()))
            }
            FieldKind::Text {
                min_length,
                max_length,
            } => {
                let value = single_text(raw)?;
                let actual = value.chars().count();
                if let Some(max) = *max_length {
                    if actual > max {
                        return Err(ValidationFailure::TooLong { max, actual });
                    }
                }
                if let Some(min) = *min_length {
                    if actual < min {
                        return Err(ValidationFailure::TooShort { min, actual });
                    }
                }
                Ok(Cleaned::Text(value.to_string()))
            }
            FieldKind::Email => {
                let value = single_text(raw)?;
                if value.validate_email() {
                    Ok(Cleaned::Text(value.to_string()))
                } else {
                    Err(ValidationFailure::InvalidEmail)
                }
            }
            FieldKind::Number { places, min, max } => {
                let value = single_text(raw)?;
                let digits: String = value
                    .chars()
                    .filter(|c| !matches!(c, ',' | '$' | '%') && !c.is_whitespace())
                    .collect();
                let mut number = digits
                    .parse::<Decimal>()
                    .map_err(|_| ValidationFailure::InvalidNumber)?;
                if let Some(places) = *places {
                    number = number.round_dp(places);
                }
                let below = min.is_some_and(|m| number < m);
                let above = max.is_some_and(|m| number > m);
                if below || above {
                    return Err(ValidationFailure::OutOfRange {
                        min: min.unwrap_or(Decimal::MIN),
                        max: max.unwrap_or(Decimal::MAX),
                    });
                }
                Ok(Cleaned::Number(number))
            }
            FieldKind::Files => match raw {
                RawValue::Text(id) => Ok(Cleaned::Files(vec![id.trim().to_string()])),
                RawValue::List(ids) => Ok(Cleaned::Files(
                    ids.iter()
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                )),
                _ => Err(ValidationFailure::WrongShape),
            },
        }
    }

    /// Score a raw value; zero for non-scorable fields.
    pub fn score(&self, raw: &RawValue) -> Decimal {
        match &self.scoring {
            Some(spec) => spec.score(&self.kind, self.clean(raw)),
            None => Decimal::ZERO,
        }
    }

    /// Effective maximum score; zero for non-scorable fields.
    pub fn max_score(&self) -> Decimal {
        self.scoring
            .as_ref()
            .map_or(Decimal::ZERO, |spec| spec.max_score(&self.kind))
    }

    pub fn min_score(&self) -> Decimal {
        self.scoring
            .as_ref()
            .map_or(Decimal::ZERO, |spec| spec.min_score)
    }

    pub fn is_scorable(&self) -> bool {
        self.scoring.is_some()
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, FieldKind::Files)
    }

    /// Split a recorded open-choice value into `(selection, other text)`.
    ///
    /// A value that is one of the listed choices is a plain selection;
    /// anything else was typed into the "other" box. Other field kinds are
    /// returned unchanged.
    pub fn decompose(&self, value: &RawValue) -> RawValue {
        let FieldKind::Choice {
            choices,
            open: true,
        } = &self.kind
        else {
            return value.clone();
        };
        match value {
            RawValue::Text(s) if s.trim().is_empty() => RawValue::Missing,
            RawValue::Text(s) if s != OTHER_CHOICE && choices.contains(s) => RawValue::Choice {
                selection: s.clone(),
                other: None,
            },
            RawValue::Text(s) => RawValue::Choice {
                selection: OTHER_CHOICE.to_string(),
                other: (s != OTHER_CHOICE).then(|| s.clone()),
            },
            other => other.clone(),
        }
    }

    /// Human-readable rendering of a cleaned value.
    pub fn display_value(&self, value: &Cleaned) -> String {
        value.to_string()
    }

    /// Single-cell export rendering of a cleaned value.
    pub fn csv_value(&self, value: &Cleaned) -> String {
        match (self.format, value) {
            (OutputFormat::List, Cleaned::Choices(items) | Cleaned::Files(items)) => items.join("|"),
            _ => value.to_string(),
        }
    }
}

fn clean_choice(choices: &[String], open: bool, raw: &RawValue) -> Result<Cleaned, ValidationFailure> {
    match raw {
        RawValue::Text(s) => {
            let s = s.trim();
            if open && s.eq_ignore_ascii_case(OTHER_CHOICE) {
                Err(ValidationFailure::OtherNotSpecified)
            } else if choices.iter().any(|c| c == s) {
                Ok(Cleaned::Text(s.to_string()))
            } else if open {
                Ok(Cleaned::Text(s.to_string()))
            } else {
                Err(ValidationFailure::InvalidChoice(s.to_string()))
            }
        }
        RawValue::Choice { selection, other } => {
            if selection.trim().eq_ignore_ascii_case(OTHER_CHOICE) {
                let text = other.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    Err(ValidationFailure::OtherNotSpecified)
                } else if open {
                    Ok(Cleaned::Text(text.to_string()))
                } else {
                    Err(ValidationFailure::InvalidChoice(text.to_string()))
                }
            } else {
                clean_choice(choices, open, &RawValue::Text(selection.clone()))
            }
        }
        RawValue::List(items) if items.len() == 1 => {
            clean_choice(choices, open, &RawValue::Text(items[0].clone()))
        }
        _ => Err(ValidationFailure::WrongShape),
    }
}

fn single_text(raw: &RawValue) -> Result<&str, ValidationFailure> {
    match raw {
        RawValue::Text(s) => Ok(s.trim()),
        RawValue::List(items) if items.len() == 1 => Ok(items[0].trim()),
        _ => Err(ValidationFailure::WrongShape),
    }
}
