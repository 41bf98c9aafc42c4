//! The `supasurvey verify` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use supasurvey_core::aggregate::ScoreAggregator;

pub fn execute(
    schema: Option<PathBuf>,
    questionset: u32,
    score: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let (config, store) = super::load_schema(schema.as_deref(), config)?;
    let aggregator = ScoreAggregator::new(store.tree(), config.unknown_types);

    let qs = store
        .get_questionset(questionset)
        .with_context(|| format!("unknown question set: {questionset}"))?;
    let max = aggregator.max_score_for_questionset(qs)?;
    let value = aggregator
        .verify(questionset, &score)
        .with_context(|| format!("verified score rejected for question set {questionset}"))?;

    println!(
        "Verified score {value} accepted for \"{}\" (max {max})",
        qs.title
    );
    Ok(())
}
