pub mod convert;
pub mod init;
pub mod score;
pub mod validate;
pub mod verify;

use std::path::{Path, PathBuf};

use anyhow::Result;

use supasurvey_core::config::{load_config_from, SurveyConfig};
use supasurvey_core::store::SchemaStore;

/// Load the config and the schema it points at, preferring `--schema`.
pub fn load_schema(
    schema: Option<&Path>,
    config: Option<PathBuf>,
) -> Result<(SurveyConfig, SchemaStore)> {
    let config = load_config_from(config.as_deref())?;
    let path = config.schema_path(schema)?;
    let store = SchemaStore::load(&path)?;
    Ok((config, store))
}
