use std::path::PathBuf;

/// Failure talking to the QC REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Server answered with a non-2xx status. `message` is already the
    /// human-readable text extracted from the body.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration file {path:?} is corrupted: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Could not write configuration file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
