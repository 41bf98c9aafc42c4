//! The `supasurvey score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use indexmap::IndexSet;
use serde::Deserialize;

use supasurvey_core::aggregate::{ResponseScore, ScoreAggregator};
use supasurvey_core::memory::InMemoryResponseStore;
use supasurvey_core::report::ScoreReport;
use supasurvey_core::traits::{OccurrenceKey, ResponseStore};
use supasurvey_core::value::FormData;

/// One question set's answers for one response, as read from the responses
/// file.
#[derive(Debug, Deserialize)]
struct Submission {
    response: String,
    questionset: u32,
    #[serde(default)]
    instances: Vec<FormData>,
    /// Accepted as a JSON string or number.
    #[serde(default)]
    verified_score: Option<serde_json::Value>,
}

pub fn execute(
    schema: Option<PathBuf>,
    responses_path: PathBuf,
    format: String,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let (config, schema) = super::load_schema(schema.as_deref(), config)?;
    let aggregator = ScoreAggregator::new(schema.tree(), config.unknown_types);

    let content = std::fs::read_to_string(&responses_path)
        .with_context(|| format!("failed to read responses: {}", responses_path.display()))?;
    let submissions: Vec<Submission> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse responses: {}", responses_path.display()))?;

    let mut store = InMemoryResponseStore::new();
    let mut response_ids = IndexSet::new();

    for submission in submissions {
        let key = OccurrenceKey::new(submission.response.clone(), submission.questionset);
        let mut record = store.get_or_create(&key)?;
        record.instances.extend(submission.instances);

        if let Some(raw) = submission.verified_score {
            let input = match raw {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            aggregator
                .set_verified_score(&mut record, &input)
                .with_context(|| format!("invalid verified score for {key}"))?;
        }

        aggregator
            .refresh(&mut record)
            .with_context(|| format!("failed to score {key}"))?;
        store.save(record)?;
        response_ids.insert(submission.response);
    }

    let scores = response_ids
        .iter()
        .map(|id| aggregator.score_response(&store, id))
        .collect::<Result<Vec<_>, _>>()?;

    let schema_name = schema
        .source()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let report = ScoreReport::new(schema_name, scores);

    let rendered = match format.as_str() {
        "json" => serde_json::to_string_pretty(&report)?,
        "markdown" | "md" => report.to_markdown(),
        "text" => render_text(&report.responses),
        other => anyhow::bail!("unknown format: {other} (expected text, json, or markdown)"),
    };

    match output {
        Some(path) => {
            if format == "json" {
                report.save_json(&path)?;
            } else {
                std::fs::write(&path, rendered)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
            }
            eprintln!("Report saved to: {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn render_text(responses: &[ResponseScore]) -> String {
    let mut out = String::new();

    for response in responses {
        out.push_str(&format!(
            "Response {}: {} / {} ({} complete)\n",
            response.response,
            response.computed_score,
            response.max_score,
            response.completion.with_unit()
        ));

        let mut table = Table::new();
        table.set_header(vec![
            "Section",
            "Question set",
            "Instances",
            "Completion",
            "Score",
            "Max",
            "Verified",
        ]);
        for section in &response.sections {
            for qs in &section.questionsets {
                table.add_row(vec![
                    Cell::new(&section.title),
                    Cell::new(&qs.title),
                    Cell::new(qs.instances),
                    Cell::new(qs.completion),
                    Cell::new(qs.computed_score),
                    Cell::new(qs.max_score),
                    Cell::new(qs.verified_score.map_or_else(|| "-".to_string(), |v| v.to_string())),
                ]);
            }
        }
        out.push_str(&format!("{table}\n\n"));
    }

    out
}
