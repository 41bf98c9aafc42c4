//! The `supasurvey validate` command.

use std::path::PathBuf;

use anyhow::Result;

use supasurvey_core::store::validate_schema;

pub fn execute(schema: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let (_, store) = super::load_schema(schema.as_deref(), config)?;
    let tree = store.tree();

    println!(
        "Schema: {} sections, {} question sets, {} answers",
        tree.sections.len(),
        tree.questionsets().count(),
        tree.answer_count()
    );

    let warnings = validate_schema(tree);
    for w in &warnings {
        println!("  WARNING: {w}");
    }

    if warnings.is_empty() {
        println!("Schema valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
