//! Error types for cdkdiff-sync.

use std::path::PathBuf;

use thiserror::Error;

use cdkdiff_core::SelectError;
use cdkdiff_detector::ResolveError;
use cdkdiff_renderer::RenderError;

/// Failures of the diff engine, either while preparing a directory or while
/// diffing a single stack.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("diff command is empty")]
    EmptyCommand,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully; `output` holds the
    /// combined stdout and stderr.
    #[error("{command} exited with status {status:?}: {output}")]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },
}

/// Failures reading or writing pull request comments.
#[derive(Debug, Error)]
pub enum CommentError {
    /// Pull request context (repository, number, token) is missing or malformed.
    #[error("pull request context: {0}")]
    Context(String),

    #[error("{method} {url} returned {status}: {body}")]
    Http {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// All errors that abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("stack selection failed for {directory}: {source}")]
    Select {
        directory: String,
        #[source]
        source: SelectError,
    },

    #[error("diff setup failed for {directory}: {source}")]
    Setup {
        directory: String,
        #[source]
        source: EngineError,
    },

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("comment write failed for {directory}: {source}")]
    Comment {
        directory: String,
        #[source]
        source: CommentError,
    },

    #[error("{count} destructive change(s) are not allowed: {resources}")]
    DestructiveChanges { count: usize, resources: String },
}

/// Convenience constructor for [`CommentError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CommentError {
    CommentError::Io {
        path: path.into(),
        source,
    }
}
