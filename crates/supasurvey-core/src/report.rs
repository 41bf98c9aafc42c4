//! Score reports with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Completion, ResponseScore, ScoreSummary};

/// Scores for one or more survey responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Where the schema was loaded from.
    pub schema: String,
    pub responses: Vec<ResponseScore>,
}

/// Rollup level of a [`ReportRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowLevel {
    Response,
    Section,
    QuestionSet,
}

/// One line of a flattened report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub response: String,
    pub level: RowLevel,
    pub id: Option<u32>,
    pub title: String,
    pub completion: Completion,
    pub max_score: Decimal,
    pub computed_score: Decimal,
    pub verified_score: Option<Decimal>,
}

impl ReportRow {
    fn new(
        response: &str,
        level: RowLevel,
        id: Option<u32>,
        title: &str,
        summary: &dyn ScoreSummary,
    ) -> Self {
        Self {
            response: response.to_string(),
            level,
            id,
            title: title.to_string(),
            completion: summary.completion(),
            max_score: summary.max_score(),
            computed_score: summary.computed_score(),
            verified_score: summary.verified_score(),
        }
    }
}

impl ScoreReport {
    pub fn new(schema: impl Into<String>, responses: Vec<ResponseScore>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            schema: schema.into(),
            responses,
        }
    }

    /// Response, section and question-set rows, depth first.
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut rows = Vec::new();
        for response in &self.responses {
            let name = response.response.as_str();
            rows.push(ReportRow::new(name, RowLevel::Response, None, name, response));
            for section in &response.sections {
                rows.push(ReportRow::new(
                    name,
                    RowLevel::Section,
                    Some(section.section),
                    &section.title,
                    section,
                ));
                for qs in &section.questionsets {
                    rows.push(ReportRow::new(
                        name,
                        RowLevel::QuestionSet,
                        Some(qs.questionset),
                        &qs.title,
                        qs,
                    ));
                }
            }
        }
        rows
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }

    /// Format the report as markdown, one table per response.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# Score report\n\nSchema: `{}`\n\n", self.schema);

        for response in &self.responses {
            md.push_str(&format!("## Response {}\n\n", response.response));
            md.push_str(&format!(
                "**Total:** {} / {} ({} complete)",
                response.computed_score,
                response.max_score,
                response.completion.with_unit()
            ));
            if let Some(verified) = response.verified_score {
                md.push_str(&format!(", verified {verified}"));
            }
            md.push_str("\n\n");

            md.push_str("| Section | Question set | Completion | Score | Max | Verified |\n");
            md.push_str("|---------|--------------|------------|-------|-----|----------|\n");
            for section in &response.sections {
                for qs in &section.questionsets {
                    md.push_str(&format!(
                        "| {} | {} | {} | {} | {} | {} |\n",
                        section.title,
                        qs.title,
                        qs.completion,
                        qs.computed_score,
                        qs.max_score,
                        qs.verified_score.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    ));
                }
                md.push_str(&format!(
                    "| **{}** | | **{}** | **{}** | **{}** | {} |\n",
                    section.title,
                    section.completion,
                    section.computed_score,
                    section.max_score,
                    section.verified_score.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                ));
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{QuestionSetScore, SectionScore};
    use rust_decimal_macros::dec;

    fn make_report() -> ScoreReport {
        let qs = QuestionSetScore {
            questionset: 10,
            title: "About you".into(),
            instances: 1,
            completion: Completion::Percent(dec!(75)),
            max_score: dec!(19),
            computed_score: dec!(16),
            verified_score: None,
        };
        let uploads = QuestionSetScore {
            questionset: 11,
            title: "Uploads".into(),
            instances: 0,
            completion: Completion::NotApplicable,
            max_score: dec!(0),
            computed_score: dec!(0),
            verified_score: Some(dec!(0)),
        };
        let section = SectionScore {
            section: 1,
            display: "One".into(),
            title: "Basics".into(),
            questionsets: vec![qs, uploads],
            completion: Completion::Percent(dec!(75)),
            max_score: dec!(19),
            computed_score: dec!(16),
            verified_score: Some(dec!(0)),
        };
        ScoreReport::new(
            "dogs.json",
            vec![ResponseScore {
                response: "r1".into(),
                sections: vec![section],
                completion: Completion::Percent(dec!(75)),
                max_score: dec!(19),
                computed_score: dec!(16),
                verified_score: Some(dec!(0)),
            }],
        )
    }

    #[test]
    fn rows_are_depth_first() {
        let rows = make_report().rows();
        let levels: Vec<RowLevel> = rows.iter().map(|r| r.level).collect();
        assert_eq!(
            levels,
            [
                RowLevel::Response,
                RowLevel::Section,
                RowLevel::QuestionSet,
                RowLevel::QuestionSet
            ]
        );
        assert_eq!(rows[2].computed_score, dec!(16));
        assert_eq!(rows[3].completion, Completion::NotApplicable);
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = ScoreReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.responses, report.responses);
    }

    #[test]
    fn markdown_output() {
        let md = make_report().to_markdown();
        assert!(md.contains("## Response r1"));
        assert!(md.contains("**Total:** 16 / 19 (75% complete)"));
        assert!(md.contains("| Basics | Uploads | N/A | 0 | 0 | 0 |"));
    }

    #[test]
    fn markdown_total_without_completion_has_no_percent_sign() {
        let mut report = make_report();
        report.responses[0].completion = Completion::NotApplicable;
        let md = report.to_markdown();
        assert!(md.contains("**Total:** 16 / 19 (N/A complete)"));
        assert!(!md.contains("N/A%"));
    }
}
