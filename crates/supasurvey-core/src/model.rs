//! Survey schema tree.
//!
//! A survey is a strictly three-level ordered tree: [`Section`] →
//! [`QuestionSet`] → [`Answer`]. Order at every level is load-bearing
//! (rendering order, answer-id derivation, scoring enumeration), so every
//! level is an [`IndexMap`].

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Separator used by the flat schema for choice and score lists.
pub const LIST_SEPARATOR: char = '|';

/// The whole survey schema, keyed by section id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaTree {
    pub sections: IndexMap<u32, Section>,
}

impl SchemaTree {
    /// Iterate every question set in schema order with its section.
    pub fn questionsets(&self) -> impl Iterator<Item = (&Section, &QuestionSet)> {
        self.sections
            .values()
            .flat_map(|s| s.questionsets.values().map(move |qs| (s, qs)))
    }

    /// Find a question set by id anywhere in the tree.
    pub fn find_questionset(&self, id: u32) -> Option<(&Section, &QuestionSet)> {
        self.questionsets().find(|(_, qs)| qs.id == id)
    }

    /// Total number of answers in the tree.
    pub fn answer_count(&self) -> usize {
        self.questionsets().map(|(_, qs)| qs.answers.len()).sum()
    }
}

/// Top-level grouping of a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questionsets: IndexMap<u32, QuestionSet>,
}

/// A renderable group of answer fields within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Whether the set may be answered several times per response.
    #[serde(default)]
    pub repeater: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeater_label: Option<String>,
    /// Dependency expression such as `"good_dog==Yes"`, evaluated by the
    /// caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
    #[serde(default)]
    pub answers: IndexMap<u32, Answer>,
}

impl QuestionSet {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            repeater: false,
            repeater_label: None,
            dependencies: None,
            answers: IndexMap::new(),
        }
    }

    /// Mark the set as a repeater with the given "add another" label.
    pub fn repeat(mut self, label: impl Into<String>) -> Self {
        self.repeater = true;
        self.repeater_label = Some(label.into());
        self
    }

    /// Append an answer, renumbering it to the next contiguous id.
    pub fn push(mut self, mut answer: Answer) -> Self {
        answer.id = self.answers.len() as u32 + 1;
        self.answers.insert(answer.id, answer);
        self
    }
}

/// One schema-defined input field within a question set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: u32,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnswerType>,
    /// Pipe-delimited choice list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minscore: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxscore: Option<Decimal>,
    /// Pipe-delimited per-choice score list, aligned with `options`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Answer {
    pub fn new(id: u32, label: impl Into<String>, kind: AnswerType) -> Self {
        Self {
            id,
            label: label.into(),
            kind: Some(kind),
            options: None,
            minscore: None,
            maxscore: None,
            scoring: None,
            correct: None,
            required: false,
        }
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.join("|"));
        self
    }

    pub fn scoring(mut self, scores: &[&str]) -> Self {
        self.scoring = Some(scores.join("|"));
        self
    }

    pub fn bounds(mut self, minscore: Option<Decimal>, maxscore: Option<Decimal>) -> Self {
        self.minscore = minscore;
        self.maxscore = maxscore;
        self
    }

    pub fn correct(mut self, correct: impl Into<String>) -> Self {
        self.correct = Some(correct.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The choice list, split on `|` with blank entries dropped.
    pub fn choices(&self) -> Vec<String> {
        split_list(self.options.as_deref())
    }

    /// The per-choice score table as decimals.
    pub fn score_table(&self) -> Result<Vec<Decimal>, rust_decimal::Error> {
        split_list(self.scoring.as_deref())
            .iter()
            .map(|s| s.parse::<Decimal>())
            .collect()
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Answer type tags understood by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerType {
    ChooseOne,
    ChooseOneOpen,
    YesNo,
    ChooseMultiple,
    /// Matrix question (one choice per subject). Known to the schema but
    /// not built by the field factory.
    ChooseOneForEach,
    Char,
    Text,
    Email,
    Numeric,
    Money,
    Percentage,
    FileMultiple,
}

impl AnswerType {
    pub const ALL: [AnswerType; 12] = [
        AnswerType::ChooseOne,
        AnswerType::ChooseOneOpen,
        AnswerType::YesNo,
        AnswerType::ChooseMultiple,
        AnswerType::ChooseOneForEach,
        AnswerType::Char,
        AnswerType::Text,
        AnswerType::Email,
        AnswerType::Numeric,
        AnswerType::Money,
        AnswerType::Percentage,
        AnswerType::FileMultiple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::ChooseOne => "choose-one",
            AnswerType::ChooseOneOpen => "choose-one-open",
            AnswerType::YesNo => "yes-no",
            AnswerType::ChooseMultiple => "choose-multiple",
            AnswerType::ChooseOneForEach => "choose-one-for-each",
            AnswerType::Char => "char",
            AnswerType::Text => "text",
            AnswerType::Email => "email",
            AnswerType::Numeric => "numeric",
            AnswerType::Money => "money",
            AnswerType::Percentage => "percentage",
            AnswerType::FileMultiple => "file-multiple",
        }
    }

    /// Whether the type is driven by a choice list.
    pub fn has_choices(&self) -> bool {
        matches!(
            self,
            AnswerType::ChooseOne
                | AnswerType::ChooseOneOpen
                | AnswerType::YesNo
                | AnswerType::ChooseMultiple
                | AnswerType::ChooseOneForEach
        )
    }

    /// File uploads never take part in completion or scoring.
    pub fn is_scorable(&self) -> bool {
        !matches!(self, AnswerType::FileMultiple)
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerType {
    type Err = String;

    /// Accepts the canonical tags as well as spelling variants found in
    /// hand-written sheets (`ChooseOneField`, `choose_one`, `yesno`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' ' | '/'))
            .collect::<String>()
            .to_lowercase();
        let folded = folded.strip_suffix("field").unwrap_or(&folded);
        match folded {
            "chooseone" | "single" | "singlechoice" => Ok(AnswerType::ChooseOne),
            "chooseoneopen" | "singleopen" => Ok(AnswerType::ChooseOneOpen),
            "yesno" | "chooseyesno" => Ok(AnswerType::YesNo),
            "choosemultiple" | "multiple" | "multichoice" => Ok(AnswerType::ChooseMultiple),
            "chooseoneforeach" => Ok(AnswerType::ChooseOneForEach),
            "char" | "shorttext" => Ok(AnswerType::Char),
            "text" | "longtext" | "open" => Ok(AnswerType::Text),
            "email" => Ok(AnswerType::Email),
            "numeric" | "number" => Ok(AnswerType::Numeric),
            "money" | "currency" => Ok(AnswerType::Money),
            "percentage" | "percent" => Ok(AnswerType::Percentage),
            "filemultiple" | "files" | "multifile" => Ok(AnswerType::FileMultiple),
            _ => Err(format!("unknown answer type: {}", s.trim())),
        }
    }
}
