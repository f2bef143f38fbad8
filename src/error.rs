use std::path::PathBuf;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by settings construction and the plumbing around the
/// engines.
///
/// The engines themselves never fail: short or degenerate input produces a
/// neutral signal instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSettings {
        field: &'static str,
        reason: &'static str,
    },

    #[error("environment variable {var} has unparsable value {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),

    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidSettings { field, reason }
    }
}

/// Returns `Err(InvalidSettings)` unless `condition` holds.
pub(crate) fn ensure(condition: bool, field: &'static str, reason: &'static str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::invalid(field, reason))
    }
}
