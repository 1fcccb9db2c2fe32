//! Error types for cdkdiff-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SelectionStrategy;

/// Failures loading a cloud assembly. Any of these aborts the directory.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Underlying I/O failure, with the path that was being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `manifest.json` is missing; the directory is not a synthesized assembly.
    #[error("no cloud assembly manifest at {path}")]
    ManifestNotFound { path: PathBuf },

    /// Manifest JSON did not parse.
    #[error("failed to parse assembly manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A stack artifact lacks a field the diff needs.
    #[error("stack artifact '{artifact}' in {path} has no {field}")]
    MissingField {
        path: PathBuf,
        artifact: String,
        field: &'static str,
    },

    /// Stack dependencies form a cycle.
    #[error("dependency cycle between stacks in {path}: {stacks}")]
    DependencyCycle { path: PathBuf, stacks: String },
}

/// A required selector match did not happen.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("invalid stack selector pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("no stack matched {patterns:?} using strategy '{strategy}'")]
    NoMatch {
        patterns: Vec<String>,
        strategy: SelectionStrategy,
    },

    #[error("strategy '{strategy}' needs exactly one stack, found {found}: {stacks}")]
    NotSingle {
        strategy: SelectionStrategy,
        found: usize,
        stacks: String,
    },

    #[error("no stack found in the main cloud assembly")]
    EmptyMainAssembly,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AssemblyError {
    AssemblyError::Io {
        path: path.into(),
        source,
    }
}
