//! Comment context: serializable rendering payload built from [`DiffResult`]s.

use serde::{Deserialize, Serialize};

use cdkdiff_core::{DiffMethod, DiffOutcome, DiffResult};

use crate::error::RenderError;

/// Everything a comment template can reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentContext {
    /// Identity marker, rendered inside an HTML comment on the first line.
    pub marker: String,
    pub title: Option<String>,
    /// Assembly directory, relative to the repository root.
    pub directory: String,
    pub base_ref: String,
    pub method: String,
    pub summary: SummaryCtx,
    /// One entry per stack, in selection order.
    pub stacks: Vec<StackCtx>,
    pub version: String,
}

/// Counts shown above the per-stack blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryCtx {
    pub total: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub errors: usize,
    pub destructive: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackCtx {
    pub display_name: String,
    pub stack_name: String,
    /// `changed`, `unchanged` or `error`.
    pub status: String,
    pub icon: String,
    pub body: String,
    pub error: Option<String>,
    pub destructive: Vec<DestructiveCtx>,
    pub replacements_known: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestructiveCtx {
    pub logical_id: String,
    pub resource_type: String,
    pub impact: String,
}

impl CommentContext {
    /// Build the context for one directory's comment.
    pub fn from_results(
        marker: &str,
        title: Option<&str>,
        directory: &str,
        base_ref: &str,
        method: DiffMethod,
        results: &[DiffResult],
    ) -> Self {
        let stacks: Vec<StackCtx> = results.iter().map(StackCtx::from_result).collect();

        let summary = SummaryCtx {
            total: results.len(),
            changed: results.iter().filter(|r| r.has_changes()).count(),
            unchanged: results
                .iter()
                .filter(|r| matches!(r.outcome, DiffOutcome::Unchanged))
                .count(),
            errors: results.iter().filter(|r| r.is_error()).count(),
            destructive: results.iter().map(|r| r.destructive_changes.len()).sum(),
        };

        CommentContext {
            marker: marker.to_string(),
            title: title.map(str::to_string),
            directory: directory.to_string(),
            base_ref: base_ref.to_string(),
            method: method.to_string(),
            summary,
            stacks,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

impl StackCtx {
    fn from_result(result: &DiffResult) -> Self {
        let (status, icon, error) = match &result.outcome {
            DiffOutcome::Changed => ("changed", ":large_orange_diamond:", None),
            DiffOutcome::Unchanged => ("unchanged", ":white_check_mark:", None),
            DiffOutcome::Error { message } => ("error", ":x:", Some(message.clone())),
        };
        StackCtx {
            display_name: result.stack.display_name.clone(),
            stack_name: result.stack.stack_name.clone(),
            status: status.to_string(),
            icon: icon.to_string(),
            body: result.body.trim_end().to_string(),
            error,
            destructive: result
                .destructive_changes
                .iter()
                .map(|c| DestructiveCtx {
                    logical_id: c.logical_id.clone(),
                    resource_type: c.resource_type.clone(),
                    impact: c.impact.to_string(),
                })
                .collect(),
            replacements_known: result.replacements_known,
            truncated: false,
        }
    }
}
