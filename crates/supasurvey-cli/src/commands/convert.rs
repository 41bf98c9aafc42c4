//! The `supasurvey convert` command.

use std::path::PathBuf;

use anyhow::Result;

use supasurvey_core::store::{read_tree, write_tree};

pub fn execute(input: PathBuf, output: PathBuf) -> Result<()> {
    let tree = read_tree(&input)?;
    write_tree(&output, &tree)?;

    println!(
        "Converted {} ({} sections, {} answers) -> {}",
        input.display(),
        tree.sections.len(),
        tree.answer_count(),
        output.display()
    );
    Ok(())
}
