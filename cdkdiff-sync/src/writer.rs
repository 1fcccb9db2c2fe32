//! Comment synchronizer: one pull request comment per assembly directory.
//!
//! ## Upsert protocol
//!
//! 1. Derive the identity key from the directory's display path and title.
//! 2. Render every stack result into a single body whose first line is the
//!    hidden marker carrying that key.
//! 3. Look up an existing comment by marker.
//! 4. Update it when found, create one otherwise. Exactly one write.

use sha2::{Digest, Sha256};

use cdkdiff_core::{CandidateDirectory, DiffMethod, DiffResult};
use cdkdiff_renderer::{CommentContext, CommentRenderer};

use crate::error::{CommentError, SyncError};

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Reference to a comment that already exists on the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentHandle {
    pub id: u64,
}

/// Pull request comment storage.
pub trait CommentStore {
    /// The comment whose body carries the marker for `key`, if any.
    fn find_existing(&self, key: &str) -> Result<Option<CommentHandle>, CommentError>;

    fn create(&self, body: &str) -> Result<CommentHandle, CommentError>;

    fn update(&self, handle: CommentHandle, body: &str) -> Result<CommentHandle, CommentError>;
}

/// Outcome of the single write made for a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Created { id: u64 },
    Updated { id: u64 },
}

impl UpsertResult {
    pub fn id(&self) -> u64 {
        match self {
            UpsertResult::Created { id } | UpsertResult::Updated { id } => *id,
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Hex SHA-256 over the display path and the (possibly empty) title.
pub fn identity_key(display_path: &str, title: Option<&str>) -> String {
    let mut h = Sha256::new();
    h.update(display_path.as_bytes());
    h.update([0u8]);
    h.update(title.unwrap_or("").as_bytes());
    hex::encode(h.finalize())
}

/// Marker token embedded in the comment, e.g. `cdkdiff:3f1a...`.
pub fn marker(key: &str) -> String {
    format!("cdkdiff:{key}")
}

/// The full hidden line stores search for.
pub fn marker_comment(key: &str) -> String {
    format!("<!-- {} -->", marker(key))
}

// ---------------------------------------------------------------------------
// comment_stacks
// ---------------------------------------------------------------------------

/// Settings shared by every comment of a run.
#[derive(Debug, Clone, Default)]
pub struct CommentOptions {
    pub title: Option<String>,
    pub base_ref: String,
    pub method: DiffMethod,
}

/// Render `results` for `directory` and upsert the comment.
pub fn comment_stacks(
    directory: &CandidateDirectory,
    results: &[DiffResult],
    options: &CommentOptions,
    renderer: &CommentRenderer,
    store: &dyn CommentStore,
) -> Result<UpsertResult, SyncError> {
    let title = options.title.as_deref();
    let key = identity_key(directory.display_path(), title);
    let ctx = CommentContext::from_results(
        &marker(&key),
        title,
        directory.display_path(),
        &options.base_ref,
        options.method,
        results,
    );
    let body = renderer.render(&ctx)?;

    let comment_err = |source| SyncError::Comment {
        directory: directory.display_path().to_string(),
        source,
    };

    let result = match store.find_existing(&key).map_err(comment_err)? {
        Some(handle) => {
            let handle = store.update(handle, &body).map_err(comment_err)?;
            UpsertResult::Updated { id: handle.id }
        }
        None => {
            let handle = store.create(&body).map_err(comment_err)?;
            UpsertResult::Created { id: handle.id }
        }
    };
    tracing::info!(directory = %directory, comment = result.id(), "comment written: {result:?}");
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
