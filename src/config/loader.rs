// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Read and deserialise a plan file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let plan: RawPlanFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), tasks = plan.task.len(), "plan file parsed");

    Ok(plan)
}

/// Read a plan file and validate it.
///
/// Rejects files without tasks, out-of-range `[config]` values, empty
/// ids, duplicate ids, unknown dependencies and cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    PlanFile::try_from(raw)
}

/// `Taskstage.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskstage.toml")
}
