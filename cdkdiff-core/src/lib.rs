//! cdkdiff core library: domain types, cloud assembly loading, stack
//! selection, errors.
//!
//! - [`types`]: newtypes, configuration enums, diff results
//! - [`assembly`]: `manifest.json` loading in dependency order
//! - [`selection`]: [`SelectionCriteria`] applied to loaded stacks
//! - [`error`]: [`AssemblyError`], [`SelectionError`]

pub mod assembly;
pub mod error;
pub mod selection;
pub mod types;

pub use error::{AssemblyError, SelectionError};
pub use selection::SelectError;
pub use types::{
    CandidateDirectory, ChangeDecision, ChangeEvidence, ChangeImpact, DestructiveChange,
    DiffMethod, DiffOutcome, DiffResult, SelectionCriteria, SelectionStrategy, Stack, StackId,
};
