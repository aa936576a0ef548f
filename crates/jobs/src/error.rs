// crates/jobs/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors writing or removing the persisted job slot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error writing job slot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize job record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the alignment endpoint.
///
/// The `Display` text is what ends up in the job record, so an endpoint
/// rejection shows the response body verbatim.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("{body}")]
    Endpoint { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Malformed alignment response: {0}")]
    Decode(#[source] reqwest::Error),
}
