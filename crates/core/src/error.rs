use std::path::PathBuf;

/// Errors raised by the building blocks in this crate.
///
/// Conversational failures (an item that is not in the catalog, a refused
/// checkout) are never errors; they come back to the caller as sentences.
/// These variants cover the infrastructure underneath.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Failed to load content from {path}: {reason}")]
    ContentLoad { path: PathBuf, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown tool: '{0}'")]
    UnknownTool(String),
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
