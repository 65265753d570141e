//! Error taxonomy for every pipeline step.
//!
//! Each variant maps to exactly one failure class so callers (and tests) can
//! match on what went wrong instead of parsing messages. The orchestrator
//! attaches the failing [`crate::pipeline::Stage`] on top of these.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Candidate path resolves outside its allowed root, or could not be resolved at all.
    #[error("path {path:?} is outside allowed directory {base:?}")]
    PathTraversal { path: PathBuf, base: PathBuf },

    #[error("invalid JSON in {path:?}: {source}")]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    SchemaValidation(String),

    #[error("too many {what}: {actual} > {limit}")]
    LimitExceeded {
        what: &'static str,
        actual: usize,
        limit: usize,
    },

    #[error("{what} too large: {size} > {limit} bytes")]
    SizeExceeded {
        what: String,
        size: u64,
        limit: u64,
    },

    #[error("file not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required variable: {0}")]
    MissingVariable(String),

    #[error("unsupported model family: {0}")]
    UnsupportedModel(String),

    #[error("model invocation failed: {code} - {message}")]
    Generation { code: String, message: String },

    #[error("upload failed: {code} - {message}")]
    Upload { code: String, message: String },

    #[error("invalid upload target: {0}")]
    InvalidTarget(String),
}

impl PipelineError {
    /// Maps a filesystem error, turning `NotFound` into its own variant.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PipelineError::NotFound { path }
        } else {
            PipelineError::Io { path, source }
        }
    }

    /// Short machine-readable name of the variant, used in logs and JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::PathTraversal { .. } => "path_traversal",
            PipelineError::MalformedConfig { .. } => "malformed_config",
            PipelineError::SchemaValidation(_) => "schema_validation",
            PipelineError::LimitExceeded { .. } => "limit_exceeded",
            PipelineError::SizeExceeded { .. } => "size_exceeded",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::Io { .. } => "io",
            PipelineError::MissingVariable(_) => "missing_variable",
            PipelineError::UnsupportedModel(_) => "unsupported_model",
            PipelineError::Generation { .. } => "generation",
            PipelineError::Upload { .. } => "upload",
            PipelineError::InvalidTarget(_) => "invalid_target",
        }
    }
}
