//! Per-directory diff orchestration.
//!
//! [`process_stacks`] prepares the engine once for a directory, then diffs
//! each selected stack in order. A failing stack becomes an error-kind
//! [`DiffResult`] and its siblings still run; a failing `prepare` aborts the
//! whole directory.

use std::fmt;

use cdkdiff_core::{
    CandidateDirectory, ChangeImpact, DestructiveChange, DiffMethod, DiffOutcome, DiffResult,
    Stack,
};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Engine seam
// ---------------------------------------------------------------------------

/// What one engine invocation produced for one stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub has_changes: bool,
    /// Diff text ready for a `diff` code fence.
    pub body: String,
    /// Output exactly as the engine printed it.
    pub raw: String,
    /// Resources the change would remove or replace.
    pub destructive: Vec<DestructiveChange>,
}

/// Computes infrastructure diffs.
pub trait DiffEngine {
    /// One-time setup for a directory, before any of its stacks are diffed.
    fn prepare(&self, _directory: &CandidateDirectory) -> Result<(), EngineError> {
        Ok(())
    }

    fn diff(
        &self,
        directory: &CandidateDirectory,
        stack: &Stack,
        method: DiffMethod,
    ) -> Result<EngineOutput, EngineError>;
}

// ---------------------------------------------------------------------------
// Directory state
// ---------------------------------------------------------------------------

/// Lifecycle of one directory within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    Pending,
    Diffing,
    Diffed,
    Failed,
}

impl fmt::Display for DirectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DirectoryState::Pending => "pending",
            DirectoryState::Diffing => "diffing",
            DirectoryState::Diffed => "diffed",
            DirectoryState::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn transition(directory: &CandidateDirectory, state: &mut DirectoryState, next: DirectoryState) {
    tracing::info!(directory = %directory, from = %state, to = %next, "directory state");
    *state = next;
}

// ---------------------------------------------------------------------------
// process_stacks
// ---------------------------------------------------------------------------

/// Diff `stacks` of `directory` in order.
pub fn process_stacks(
    directory: &CandidateDirectory,
    stacks: &[Stack],
    method: DiffMethod,
    engine: &dyn DiffEngine,
) -> Result<Vec<DiffResult>, EngineError> {
    let mut state = DirectoryState::Pending;

    if let Err(e) = engine.prepare(directory) {
        transition(directory, &mut state, DirectoryState::Failed);
        return Err(e);
    }
    transition(directory, &mut state, DirectoryState::Diffing);

    let mut results = Vec::with_capacity(stacks.len());
    for stack in stacks {
        tracing::debug!(stack = %stack.display_name, method = %method, "diffing stack");
        let result = match engine.diff(directory, stack, method) {
            Ok(output) => from_output(stack, method, output),
            Err(e) => {
                tracing::warn!(stack = %stack.display_name, "diff failed: {e}");
                DiffResult {
                    stack: stack.clone(),
                    outcome: DiffOutcome::Error {
                        message: e.to_string(),
                    },
                    body: String::new(),
                    raw: String::new(),
                    destructive_changes: vec![],
                    replacements_known: method.detects_replacements(),
                }
            }
        };
        results.push(result);
    }

    transition(directory, &mut state, DirectoryState::Diffed);
    Ok(results)
}

fn from_output(stack: &Stack, method: DiffMethod, output: EngineOutput) -> DiffResult {
    let replacements_known = method.detects_replacements();
    // Without a change set, replacement hints are guesses; only removals stand.
    let destructive_changes = output
        .destructive
        .into_iter()
        .filter(|c| replacements_known || c.impact == ChangeImpact::Destroy)
        .collect();
    DiffResult {
        stack: stack.clone(),
        outcome: if output.has_changes {
            DiffOutcome::Changed
        } else {
            DiffOutcome::Unchanged
        },
        body: if output.has_changes {
            output.body
        } else {
            String::new()
        },
        raw: output.raw,
        destructive_changes,
        replacements_known,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
