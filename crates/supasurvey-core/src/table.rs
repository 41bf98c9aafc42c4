//! Flat schema table.
//!
//! The flat representation has one row per answer, each row carrying the
//! attributes of its section and question set under `section_*` and
//! `questionset_*` columns. [`parse_rows`] nests rows into a [`SchemaTree`]
//! in a single pass; [`flatten`] is its inverse.

use std::io;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::error::SchemaParseError;
use crate::model::{Answer, AnswerType, QuestionSet, SchemaTree, Section, LIST_SEPARATOR};

/// One flat schema record, column name → cell.
pub type SchemaRow = IndexMap<String, String>;

/// Canonical column order used by [`flatten`] and [`write_csv`].
pub const COLUMNS: [&str; 16] = [
    "section_id",
    "section_display",
    "section_title",
    "questionset_id",
    "questionset_title",
    "questionset_description",
    "questionset_repeater_label",
    "questionset_dependencies",
    "answer_label",
    "answer_type",
    "answer_options",
    "answer_minscore",
    "answer_maxscore",
    "answer_scoring",
    "answer_correct",
    "answer_required",
];

/// Nest flat rows into a schema tree.
///
/// Sections and question sets are opened in first-seen order. Every row
/// appends exactly one answer to its question set, numbered from 1 within
/// that set.
pub fn parse_rows(rows: &[SchemaRow]) -> Result<SchemaTree, SchemaParseError> {
    let mut tree = SchemaTree::default();

    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 1;
        let section_id = required_id(row, line, "section_id")?;
        let questionset_id = required_id(row, line, "questionset_id")?;

        let kind = cell(row, "answer_type")
            .map(|tag| {
                tag.parse::<AnswerType>()
                    .map_err(|_| SchemaParseError::UnknownAnswerType {
                        row: line,
                        tag: tag.to_string(),
                    })
            })
            .transpose()?;
        let minscore = decimal_cell(row, line, "answer_minscore")?;
        let maxscore = decimal_cell(row, line, "answer_maxscore")?;
        let scoring = cell(row, "answer_scoring").map(String::from);
        if let Some(table) = &scoring {
            for entry in table.split(LIST_SEPARATOR).map(str::trim) {
                if !entry.is_empty() && entry.parse::<Decimal>().is_err() {
                    return Err(SchemaParseError::InvalidDecimal {
                        row: line,
                        column: "answer_scoring",
                        value: table.clone(),
                    });
                }
            }
        }

        let section = tree
            .sections
            .entry(section_id)
            .or_insert_with(|| Section {
                id: section_id,
                display: text(row, "section_display"),
                title: text(row, "section_title"),
                questionsets: IndexMap::new(),
            });

        let questionset = section
            .questionsets
            .entry(questionset_id)
            .or_insert_with(|| {
                let repeater_label = cell(row, "questionset_repeater_label").map(String::from);
                QuestionSet {
                    id: questionset_id,
                    title: text(row, "questionset_title"),
                    description: text(row, "questionset_description"),
                    repeater: repeater_label.is_some(),
                    repeater_label,
                    dependencies: cell(row, "questionset_dependencies").map(String::from),
                    answers: IndexMap::new(),
                }
            });

        let answer_id = questionset.answers.len() as u32 + 1;
        questionset.answers.insert(
            answer_id,
            Answer {
                id: answer_id,
                label: text(row, "answer_label"),
                kind,
                options: cell(row, "answer_options").map(String::from),
                minscore,
                maxscore,
                scoring,
                correct: cell(row, "answer_correct").map(String::from),
                required: cell(row, "answer_required").is_some_and(is_truthy),
            },
        );
    }

    tracing::debug!(
        sections = tree.sections.len(),
        answers = tree.answer_count(),
        "parsed schema table"
    );
    Ok(tree)
}

/// Flatten a tree back into one row per answer, in schema order.
pub fn flatten(tree: &SchemaTree) -> Vec<SchemaRow> {
    let mut rows = Vec::with_capacity(tree.answer_count());
    for (section, questionset) in tree.questionsets() {
        for answer in questionset.answers.values() {
            let cells = [
                section.id.to_string(),
                section.display.clone(),
                section.title.clone(),
                questionset.id.to_string(),
                questionset.title.clone(),
                questionset.description.clone(),
                questionset.repeater_label.clone().unwrap_or_default(),
                questionset.dependencies.clone().unwrap_or_default(),
                answer.label.clone(),
                answer.kind.map(|k| k.to_string()).unwrap_or_default(),
                answer.options.clone().unwrap_or_default(),
                answer.minscore.map(|d| d.to_string()).unwrap_or_default(),
                answer.maxscore.map(|d| d.to_string()).unwrap_or_default(),
                answer.scoring.clone().unwrap_or_default(),
                answer.correct.clone().unwrap_or_default(),
                if answer.required { "true".into() } else { String::new() },
            ];
            rows.push(
                COLUMNS
                    .iter()
                    .map(|c| c.to_string())
                    .zip(cells)
                    .collect::<SchemaRow>(),
            );
        }
    }
    rows
}

/// Read header-keyed flat rows from CSV.
pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<SchemaRow>, SchemaParseError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: SchemaRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        if row.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows as CSV with the canonical header.
pub fn write_csv<W: io::Write>(writer: W, rows: &[SchemaRow]) -> Result<(), SchemaParseError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.write_record(
            COLUMNS
                .iter()
                .map(|c| row.get(*c).map(String::as_str).unwrap_or("")),
        )?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// A trimmed, non-empty cell.
fn cell<'a>(row: &'a SchemaRow, column: &str) -> Option<&'a str> {
    row.get(column).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn text(row: &SchemaRow, column: &str) -> String {
    cell(row, column).unwrap_or_default().to_string()
}

fn required_id(row: &SchemaRow, line: usize, column: &'static str) -> Result<u32, SchemaParseError> {
    let value = cell(row, column).ok_or(SchemaParseError::MissingColumn { row: line, column })?;
    value.parse::<u32>().map_err(|_| SchemaParseError::InvalidId {
        row: line,
        column,
        value: value.to_string(),
    })
}

fn decimal_cell(
    row: &SchemaRow,
    line: usize,
    column: &'static str,
) -> Result<Option<Decimal>, SchemaParseError> {
    cell(row, column)
        .map(|v| {
            v.parse::<Decimal>()
                .map_err(|_| SchemaParseError::InvalidDecimal {
                    row: line,
                    column,
                    value: v.to_string(),
                })
        })
        .transpose()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "x" | "required"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(pairs: &[(&str, &str)]) -> SchemaRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_rows() -> Vec<SchemaRow> {
        vec![
            row(&[
                ("section_id", "1"),
                ("section_display", "Profile"),
                ("section_title", "About you"),
                ("questionset_id", "10"),
                ("questionset_title", "Contact"),
                ("answer_label", "What is your email address?"),
                ("answer_type", "email"),
                ("answer_maxscore", "2"),
            ]),
            row(&[
                ("section_id", "1"),
                ("questionset_id", "10"),
                ("answer_label", "Are you a good dog?"),
                ("answer_type", "yes-no"),
                ("answer_maxscore", "10"),
            ]),
            row(&[
                ("section_id", "1"),
                ("questionset_id", "11"),
                ("questionset_title", "Pets"),
                ("questionset_repeater_label", "Add another pet"),
                ("answer_label", "Pet name"),
                ("answer_type", "char"),
                ("answer_required", "yes"),
            ]),
            row(&[
                ("section_id", "2"),
                ("section_display", "Experience"),
                ("questionset_id", "20"),
                ("answer_label", "How long?"),
                ("answer_type", "choose-one"),
                ("answer_options", "1-2 years|3-5 years|5-10 years"),
                ("answer_scoring", "3|4|5"),
            ]),
        ]
    }

    #[test]
    fn nests_three_levels_in_first_seen_order() {
        let tree = parse_rows(&sample_rows()).unwrap();
        assert_eq!(tree.sections.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let profile = &tree.sections[&1];
        assert_eq!(profile.display, "Profile");
        assert_eq!(
            profile.questionsets.keys().copied().collect::<Vec<_>>(),
            vec![10, 11]
        );

        let contact = &profile.questionsets[&10];
        assert_eq!(contact.answers.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(contact.answers[&2].kind, Some(AnswerType::YesNo));
        assert_eq!(contact.answers[&1].maxscore, Some(dec!(2)));
        assert!(!contact.repeater);
    }

    #[test]
    fn answer_counter_is_scoped_per_questionset() {
        let tree = parse_rows(&sample_rows()).unwrap();
        let pets = &tree.sections[&1].questionsets[&11];
        assert_eq!(pets.answers.keys().copied().collect::<Vec<_>>(), vec![1]);
        let experience = &tree.sections[&2].questionsets[&20];
        assert_eq!(experience.answers[&1].id, 1);
    }

    #[test]
    fn repeater_follows_label() {
        let tree = parse_rows(&sample_rows()).unwrap();
        let pets = &tree.sections[&1].questionsets[&11];
        assert!(pets.repeater);
        assert_eq!(pets.repeater_label.as_deref(), Some("Add another pet"));
        assert!(pets.answers[&1].required);
    }

    #[test]
    fn missing_ids_are_fatal() {
        let rows = vec![row(&[("section_id", "1"), ("answer_label", "orphan")])];
        let err = parse_rows(&rows).unwrap_err();
        assert!(matches!(
            err,
            SchemaParseError::MissingColumn {
                row: 1,
                column: "questionset_id"
            }
        ));

        let rows = vec![row(&[("section_id", "one"), ("questionset_id", "1")])];
        assert!(matches!(
            parse_rows(&rows).unwrap_err(),
            SchemaParseError::InvalidId { .. }
        ));
    }

    #[test]
    fn unknown_type_and_bad_scores_are_fatal() {
        let rows = vec![row(&[
            ("section_id", "1"),
            ("questionset_id", "1"),
            ("answer_type", "slider"),
        ])];
        assert!(matches!(
            parse_rows(&rows).unwrap_err(),
            SchemaParseError::UnknownAnswerType { row: 1, .. }
        ));

        let rows = vec![row(&[
            ("section_id", "1"),
            ("questionset_id", "1"),
            ("answer_type", "choose-one"),
            ("answer_scoring", "1|x"),
        ])];
        assert!(matches!(
            parse_rows(&rows).unwrap_err(),
            SchemaParseError::InvalidDecimal {
                column: "answer_scoring",
                ..
            }
        ));
    }

    #[test]
    fn flatten_then_nest_reproduces_the_tree() {
        let tree = parse_rows(&sample_rows()).unwrap();
        let rows = flatten(&tree);
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[0].keys().map(String::as_str).collect::<Vec<_>>(),
            COLUMNS.to_vec()
        );
        assert_eq!(parse_rows(&rows).unwrap(), tree);
    }

    #[test]
    fn csv_round_trip() {
        let tree = parse_rows(&sample_rows()).unwrap();
        let mut buf = Vec::new();
        write_csv(&mut buf, &flatten(&tree)).unwrap();

        let rows = read_csv(buf.as_slice()).unwrap();
        assert_eq!(parse_rows(&rows).unwrap(), tree);
    }

    #[test]
    fn csv_skips_blank_lines() {
        let data = "section_id,questionset_id,answer_label\n1,1,Name\n,,\n1,1,Email\n";
        let rows = read_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        let tree = parse_rows(&rows).unwrap();
        assert_eq!(tree.sections[&1].questionsets[&1].answers.len(), 2);
    }
}
