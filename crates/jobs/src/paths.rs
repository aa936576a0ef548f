//! Storage locations for the job slot.

use std::path::{Path, PathBuf};

/// Versioned name of the job slot. Bump the suffix on incompatible record
/// changes; records under an older name are left orphaned, never parsed.
pub const JOB_SLOT_KEY: &str = "job-iep-align-v1";

/// App data root: `~/.local/share/iep-align/` (Linux) or
/// `~/Library/Application Support/iep-align/` (macOS).
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("iep-align"))
}

/// Job slot file inside `dir`: `<dir>/job-iep-align-v1.json`.
pub fn job_slot_path(dir: &Path) -> PathBuf {
    dir.join(format!("{JOB_SLOT_KEY}.json"))
}
