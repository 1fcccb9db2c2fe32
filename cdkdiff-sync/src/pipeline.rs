//! End-to-end run: resolve, select, diff and comment, one directory at a time.
//!
//! Any error aborts the run immediately. Comments already written for earlier
//! directories stay in place.

use std::path::PathBuf;

use cdkdiff_core::{
    selection, CandidateDirectory, DestructiveChange, DiffMethod, DiffResult, SelectionCriteria,
};
use cdkdiff_detector::{resolve, ChangeDetector};
use cdkdiff_renderer::CommentRenderer;

use crate::diff::{process_stacks, DiffEngine};
use crate::error::SyncError;
use crate::writer::{comment_stacks, CommentOptions, CommentStore, UpsertResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Typed run configuration, built by the CLI from flags and environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Repository root the directory pattern is expanded under.
    pub root: PathBuf,
    pub cdk_out_dirs: String,
    pub base_ref: String,
    pub selection: SelectionCriteria,
    pub method: DiffMethod,
    pub title: Option<String>,
    pub destructive: DestructivePolicy,
}

/// Whether destructive changes fail the run, and which resource types are
/// exempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestructivePolicy {
    pub fail: bool,
    pub allowed_types: Vec<String>,
}

impl DestructivePolicy {
    pub fn allows(&self, change: &DestructiveChange) -> bool {
        self.allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&change.resource_type))
    }
}

/// External systems a run talks to.
pub struct Collaborators<'a> {
    pub vcs: &'a dyn ChangeDetector,
    pub engine: &'a dyn DiffEngine,
    pub comments: &'a dyn CommentStore,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// What happened to one changed directory.
#[derive(Debug, Clone)]
pub struct DirectoryReport {
    pub directory: CandidateDirectory,
    pub results: Vec<DiffResult>,
    pub comment: UpsertResult,
}

impl DirectoryReport {
    pub fn changed(&self) -> usize {
        self.results.iter().filter(|r| r.has_changes()).count()
    }

    pub fn errors(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    pub fn unchanged(&self) -> usize {
        self.results.len() - self.changed() - self.errors()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Directories matched by the pattern, changed or not.
    pub matched: usize,
    /// One report per changed directory, in glob order.
    pub directories: Vec<DirectoryReport>,
}

impl RunSummary {
    /// True when nothing changed and no comment was written.
    pub fn is_noop(&self) -> bool {
        self.directories.is_empty()
    }

    /// Destructive changes the policy does not exempt, with their stack.
    pub fn blocked_changes<'a>(
        &'a self,
        policy: &DestructivePolicy,
    ) -> Vec<(&'a str, &'a DestructiveChange)> {
        self.directories
            .iter()
            .flat_map(|d| d.results.iter())
            .flat_map(|r| {
                r.destructive_changes
                    .iter()
                    .map(move |c| (r.stack.display_name.as_str(), c))
            })
            .filter(|(_, c)| !policy.allows(c))
            .collect()
    }

    /// Fail when the policy asks for it and a blocked change exists.
    pub fn enforce(&self, policy: &DestructivePolicy) -> Result<(), SyncError> {
        if !policy.fail {
            return Ok(());
        }
        let blocked = self.blocked_changes(policy);
        if blocked.is_empty() {
            return Ok(());
        }
        let resources = blocked
            .iter()
            .map(|(stack, c)| format!("{stack}/{} ({}, {})", c.logical_id, c.resource_type, c.impact))
            .collect::<Vec<_>>()
            .join(", ");
        Err(SyncError::DestructiveChanges {
            count: blocked.len(),
            resources,
        })
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run the whole pipeline. Returns an empty summary when no matched
/// directory changed.
pub fn run(
    config: &RunConfig,
    collaborators: &Collaborators<'_>,
    renderer: &CommentRenderer,
) -> Result<RunSummary, SyncError> {
    let resolution = resolve(
        &config.root,
        &config.cdk_out_dirs,
        &config.base_ref,
        collaborators.vcs,
    )?;
    let changed = resolution.changed();
    tracing::info!(
        matched = resolution.matched(),
        changed = changed.len(),
        "resolved assembly directories"
    );

    let mut summary = RunSummary {
        matched: resolution.matched(),
        directories: Vec::with_capacity(changed.len()),
    };
    if changed.is_empty() {
        tracing::info!("no assembly directory changed since {}", config.base_ref);
        return Ok(summary);
    }

    let options = CommentOptions {
        title: config.title.clone(),
        base_ref: config.base_ref.clone(),
        method: config.method,
    };

    for directory in changed {
        let stacks =
            selection::select(&directory, &config.selection).map_err(|source| SyncError::Select {
                directory: directory.display_path().to_string(),
                source,
            })?;
        tracing::info!(directory = %directory, stacks = stacks.len(), "selected stacks");

        let results = process_stacks(&directory, &stacks, config.method, collaborators.engine)
            .map_err(|source| SyncError::Setup {
                directory: directory.display_path().to_string(),
                source,
            })?;

        let comment = comment_stacks(
            &directory,
            &results,
            &options,
            renderer,
            collaborators.comments,
        )?;

        summary.directories.push(DirectoryReport {
            directory,
            results,
            comment,
        });
    }

    Ok(summary)
}
