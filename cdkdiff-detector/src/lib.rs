//! Change scope resolution for `cdkdiff-detector`.
//!
//! [`resolve`] expands the assembly-directory glob (e.g. `**/cdk.out`) under a
//! repository root and keeps the directories whose owning project (the parent
//! of each match) differs from the base ref. Comparison failures are
//! fail-open: a directory whose comparison cannot run is treated as changed.

use std::path::{Path, PathBuf};

use glob::MatchOptions;
use thiserror::Error;

use cdkdiff_core::{CandidateDirectory, ChangeDecision, ChangeEvidence};

pub mod git;

pub use git::GitCli;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Lists files that differ between a base ref and `HEAD` under a path.
pub trait ChangeDetector {
    fn changed_paths(&self, base_ref: &str, path: &Path) -> Result<Vec<PathBuf>, VcsError>;
}

/// The comparison could not be executed.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("comparison exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
}

/// Configuration problems found while expanding the directory pattern.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid directory pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("no directories matched '{pattern}' under {}", root.display())]
    NoMatches { pattern: String, root: PathBuf },
}

/// A candidate directory together with its change decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub directory: CandidateDirectory,
    pub decision: ChangeDecision,
}

/// Result of [`resolve`]: every candidate in glob order, decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub candidates: Vec<Candidate>,
}

impl Resolution {
    /// Directories that passed the change filter, in glob order.
    pub fn changed(&self) -> Vec<CandidateDirectory> {
        self.candidates
            .iter()
            .filter(|c| c.decision.changed)
            .map(|c| c.directory.clone())
            .collect()
    }

    pub fn matched(&self) -> usize {
        self.candidates.len()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Expand `pattern` relative to `root`. Non-directory matches are dropped;
/// hidden directories are not descended into. Order is the glob's own
/// (lexicographic per path segment); duplicates are kept.
pub fn expand(root: &Path, pattern: &str) -> Result<Vec<CandidateDirectory>, ResolveError> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
        format!("{}/{}", escaped_root.trim_end_matches('/'), pattern)
    };

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: true,
    };
    let paths = glob::glob_with(&full, options).map_err(|e| ResolveError::Pattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut out = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if let Some(candidate) = CandidateDirectory::from_match(root, path) {
                    out.push(candidate);
                }
            }
            Err(err) => tracing::warn!("skipping unreadable glob entry: {err}"),
        }
    }
    Ok(out)
}

/// Decide whether `directory`'s owning project changed since `base_ref`.
pub fn decide(
    vcs: &dyn ChangeDetector,
    base_ref: &str,
    directory: &CandidateDirectory,
) -> ChangeDecision {
    match vcs.changed_paths(base_ref, directory.project_dir()) {
        Ok(paths) => ChangeDecision::from_paths(paths),
        Err(err) => {
            tracing::warn!(
                "could not compare {} against {base_ref}, treating as changed: {err}",
                directory
            );
            ChangeDecision::detection_failed(err.to_string())
        }
    }
}

/// Expand `pattern` and attach a change decision to every match.
///
/// Returns [`ResolveError::NoMatches`] when the pattern matches no directory at
/// all. An empty [`Resolution::changed`] is not an error.
pub fn resolve(
    root: &Path,
    pattern: &str,
    base_ref: &str,
    vcs: &dyn ChangeDetector,
) -> Result<Resolution, ResolveError> {
    let directories = expand(root, pattern)?;
    if directories.is_empty() {
        return Err(ResolveError::NoMatches {
            pattern: pattern.to_string(),
            root: root.to_path_buf(),
        });
    }

    let candidates = directories
        .into_iter()
        .map(|directory| {
            let decision = decide(vcs, base_ref, &directory);
            match &decision.evidence {
                ChangeEvidence::Paths(paths) => tracing::info!(
                    "{}: {} file(s) changed since {base_ref}",
                    directory,
                    paths.len()
                ),
                ChangeEvidence::NoDifferences => {
                    tracing::info!("{}: unchanged since {base_ref}, skipping", directory)
                }
                ChangeEvidence::DetectionFailed(_) => {}
            }
            Candidate {
                directory,
                decision,
            }
        })
        .collect();

    Ok(Resolution { candidates })
}
