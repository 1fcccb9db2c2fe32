//! # cdkdiff-sync
//!
//! Diff orchestration and pull request comment synchronisation.
//!
//! Call [`pipeline::run`] with a [`RunConfig`] and the run's
//! [`Collaborators`] to diff every changed assembly directory and upsert one
//! comment per directory. The concrete collaborators are [`CdkCli`] for diffs
//! and [`GithubComments`] for comments; tests substitute their own.

pub mod cdk;
pub mod diff;
pub mod error;
pub mod github;
pub mod pipeline;
pub mod writer;

pub use cdk::CdkCli;
pub use diff::{process_stacks, DiffEngine, DirectoryState, EngineOutput};
pub use error::{CommentError, EngineError, SyncError};
pub use github::{GithubComments, PullRequestRef};
pub use pipeline::{Collaborators, DestructivePolicy, DirectoryReport, RunConfig, RunSummary};
pub use writer::{comment_stacks, identity_key, CommentHandle, CommentOptions, CommentStore, UpsertResult};
