//! # cdkdiff-renderer
//!
//! Tera-based rendering of pull request comments from stack diff results.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cdkdiff_core::{DiffMethod, DiffResult};
//! use cdkdiff_renderer::{CommentContext, CommentRenderer};
//!
//! fn render(results: &[DiffResult]) {
//!     if let Ok(renderer) = CommentRenderer::new() {
//!         let ctx = CommentContext::from_results(
//!             "cdkdiff:0f3a",
//!             Some("Infrastructure"),
//!             "app/cdk.out",
//!             "origin/main",
//!             DiffMethod::ChangeSet,
//!             results,
//!         );
//!         if let Ok(body) = renderer.render(&ctx) {
//!             println!("{body}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::CommentContext;
pub use engine::{CommentRenderer, TemplateEngine, MAX_COMMENT_BYTES};
pub use error::RenderError;
