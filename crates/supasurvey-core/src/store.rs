//! Schema store and JSON interchange.
//!
//! A [`SchemaStore`] is an explicit handle on one survey schema. File-backed
//! stores re-read their source only on [`SchemaStore::reload`]; each reload
//! bumps [`SchemaStore::revision`] so callers can tell cached rollups apart.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::SchemaParseError;
use crate::field::{self, FieldArgs};
use crate::model::{AnswerType, QuestionSet, SchemaTree, Section};
use crate::table;

/// Serialize a tree to the JSON interchange format.
pub fn serialize(tree: &SchemaTree) -> Result<String, SchemaParseError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Parse the JSON interchange format.
///
/// Section ids missing from the body are taken from their keys.
pub fn deserialize(text: &str) -> Result<SchemaTree, SchemaParseError> {
    let mut tree: SchemaTree = serde_json::from_str(text)?;
    for (key, section) in tree.sections.iter_mut() {
        if section.id == 0 {
            section.id = *key;
        }
    }
    Ok(tree)
}

/// Whether `path` names a flat CSV table rather than a JSON document.
fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Read a schema tree from a JSON document or a CSV table.
pub fn read_tree(path: &Path) -> Result<SchemaTree> {
    if is_csv(path) {
        let file = fs::File::open(path)
            .with_context(|| format!("failed to open schema table: {}", path.display()))?;
        let rows = table::read_csv(file)
            .with_context(|| format!("failed to read schema table: {}", path.display()))?;
        table::parse_rows(&rows)
            .with_context(|| format!("failed to parse schema table: {}", path.display()))
    } else {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema: {}", path.display()))?;
        deserialize(&content).with_context(|| format!("failed to parse schema: {}", path.display()))
    }
}

/// Write a schema tree as JSON, or as a CSV table when `path` ends in `.csv`.
pub fn write_tree(path: &Path, tree: &SchemaTree) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    if is_csv(path) {
        let file = fs::File::create(path)
            .with_context(|| format!("failed to create schema table: {}", path.display()))?;
        table::write_csv(file, &table::flatten(tree))
            .with_context(|| format!("failed to write schema table: {}", path.display()))
    } else {
        let json = serialize(tree)?;
        fs::write(path, json).with_context(|| format!("failed to write schema: {}", path.display()))
    }
}

/// Handle on one survey schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
    tree: SchemaTree,
    source: Option<PathBuf>,
    revision: u64,
}

impl SchemaStore {
    pub fn new(tree: SchemaTree) -> Self {
        Self {
            tree,
            source: None,
            revision: 0,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaParseError> {
        deserialize(text).map(Self::new)
    }

    /// Load a schema file and remember its path for [`reload`](Self::reload).
    pub fn load(path: &Path) -> Result<Self> {
        let tree = read_tree(path)?;
        tracing::debug!(
            path = %path.display(),
            sections = tree.sections.len(),
            answers = tree.answer_count(),
            "loaded schema"
        );
        Ok(Self {
            tree,
            source: Some(path.to_path_buf()),
            revision: 0,
        })
    }

    /// Re-read the source file. Stores built in memory are left unchanged.
    pub fn reload(&mut self) -> Result<()> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        self.tree = read_tree(path)?;
        self.revision += 1;
        tracing::debug!(path = %path.display(), revision = self.revision, "reloaded schema");
        Ok(())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    pub fn serialize(&self) -> Result<String, SchemaParseError> {
        serialize(&self.tree)
    }

    pub fn get_section(&self, id: u32) -> Option<&Section> {
        self.tree.sections.get(&id)
    }

    /// Question sets of a section, in schema order.
    pub fn get_questionsets(&self, section_id: u32) -> Option<Vec<&QuestionSet>> {
        self.get_section(section_id)
            .map(|s| s.questionsets.values().collect())
    }

    pub fn get_questionset(&self, id: u32) -> Option<&QuestionSet> {
        self.tree.find_questionset(id).map(|(_, qs)| qs)
    }
}

/// A non-fatal problem found in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaWarning {
    pub section: u32,
    pub questionset: Option<u32>,
    pub answer: Option<u32>,
    pub message: String,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section {}", self.section)?;
        if let Some(qs) = self.questionset {
            write!(f, ", question set {qs}")?;
        }
        if let Some(answer) = self.answer {
            write!(f, ", answer {answer}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Lint a schema for problems that binding would silently work around.
pub fn validate_schema(tree: &SchemaTree) -> Vec<SchemaWarning> {
    let mut warnings = Vec::new();
    let mut seen: HashMap<u32, u32> = HashMap::new();

    for (section, qs) in tree.questionsets() {
        let warn = |answer: Option<u32>, message: String| SchemaWarning {
            section: section.id,
            questionset: Some(qs.id),
            answer,
            message,
        };

        if let Some(first) = seen.insert(qs.id, section.id) {
            warnings.push(warn(
                None,
                format!("duplicate question set id {} (also in section {first})", qs.id),
            ));
        }

        if qs.repeater && qs.repeater_label.as_deref().map_or(true, |l| l.trim().is_empty()) {
            warnings.push(warn(None, "repeater has no label".into()));
        }

        for answer in qs.answers.values() {
            let Some(kind) = answer.kind else {
                warnings.push(warn(Some(answer.id), "answer has no type".into()));
                continue;
            };

            let args = match FieldArgs::from_answer(answer) {
                Ok(args) => args,
                Err(_) => {
                    warnings.push(warn(
                        Some(answer.id),
                        format!(
                            "score table {:?} is not a list of decimals",
                            answer.scoring.as_deref().unwrap_or_default()
                        ),
                    ));
                    continue;
                }
            };
            let choice_count = args.choices.len();
            let score_count = args.scores.len();

            if let Err(e) = field::build(kind, args) {
                warnings.push(warn(Some(answer.id), format!("{e}; the field will be omitted")));
                continue;
            }

            if kind.has_choices() && kind != AnswerType::YesNo && choice_count == 0 {
                warnings.push(warn(Some(answer.id), format!("{kind} answer has no options")));
            }
            if score_count > 0 && !kind.has_choices() {
                warnings.push(warn(
                    Some(answer.id),
                    format!("score table on a {kind} answer is ignored"),
                ));
            } else if score_count > 0 && kind != AnswerType::YesNo && score_count < choice_count {
                warnings.push(warn(
                    Some(answer.id),
                    format!("score table has {score_count} entries for {choice_count} options"),
                ));
            }
        }
    }

    warnings
}
