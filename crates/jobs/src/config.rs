// crates/jobs/src/config.rs
//! Runtime configuration for the job tracker.

use std::path::PathBuf;
use std::time::Duration;

use crate::paths;

/// Default alignment backend.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Default port for the HTTP surface.
pub const DEFAULT_PORT: u16 = 47900;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignConfig {
    /// Base URL of the alignment backend, without trailing slash.
    pub api_base: String,
    /// Bearer token sent with every alignment request.
    pub auth_token: Option<String>,
    /// Directory holding the job slot. `None` means the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub port: u16,
    /// Per-request timeout. `None` leaves a hung request running.
    pub request_timeout_secs: Option<u64>,
    /// Persist the job slot across restarts.
    pub persist: bool,
    /// Delete the persisted slot on graceful shutdown.
    pub clear_on_shutdown: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            auth_token: None,
            data_dir: None,
            port: DEFAULT_PORT,
            request_timeout_secs: None,
            persist: true,
            clear_on_shutdown: false,
        }
    }
}

impl AlignConfig {
    /// Defaults overridden by `IEP_ALIGN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_base: non_empty("IEP_ALIGN_API_URL")
                .map(|v| normalize_api_base(&v))
                .unwrap_or(defaults.api_base),
            auth_token: non_empty("IEP_ALIGN_TOKEN"),
            data_dir: non_empty("IEP_ALIGN_DATA_DIR").map(PathBuf::from),
            port: non_empty("IEP_ALIGN_PORT")
                .or_else(|| non_empty("PORT"))
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            request_timeout_secs: non_empty("IEP_ALIGN_TIMEOUT_SECS").and_then(|s| s.parse().ok()),
            persist: non_empty("IEP_ALIGN_PERSIST")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.persist),
            clear_on_shutdown: non_empty("IEP_ALIGN_CLEAR_ON_SHUTDOWN")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.clear_on_shutdown),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Directory for the job slot: explicit `data_dir`, else the platform default.
    pub fn slot_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(paths::app_data_dir)
    }
}

pub fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn parse_flag(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}
