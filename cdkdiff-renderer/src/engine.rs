//! Tera rendering engine: [`TemplateEngine`] and [`CommentRenderer`].
//!
//! # Templates
//!
//! | Name                     | Purpose                                   |
//! |--------------------------|-------------------------------------------|
//! | `comment.md.tera`        | One comment per assembly directory        |
//! | `shared/_header.tera`    | Identity marker, title, directory heading |
//! | `shared/_summary.tera`   | Stack counts and destructive warning      |
//! | `shared/_footer.tera`    | Version footer                            |
//!
//! Any of these can be overridden by a `.tera` file with the same relative
//! name in a user template directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::CommentContext;
use crate::error::RenderError;

/// Hard limit on an issue comment body, in bytes.
pub const MAX_COMMENT_BYTES: usize = 65_536;

/// Root template name.
pub const COMMENT_TEMPLATE: &str = "comment.md.tera";

const TRUNCATION_NOTE: &str = "\n\n_Comment truncated to fit the size limit._\n";
const LAYOUT_SLACK: usize = 1_024;
/// Longest suffix [`close_open_blocks`] can append.
const CLOSE_BLOCKS: &str = "\n```\n</details>\n";

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_header.tera", include_str!("templates/_partials/header.tera")),
    ("shared/_summary.tera", include_str!("templates/_partials/summary.tera")),
    ("shared/_footer.tera", include_str!("templates/_partials/footer.tera")),
    (COMMENT_TEMPLATE, include_str!("templates/comment.md.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded defaults.
/// Template names are normalised to lowercase and relative paths.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render the comment template, normalising line endings to LF.
    pub fn render(&self, ctx: &CommentContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let content = self.tera.render(COMMENT_TEMPLATE, &tera_ctx)?;
        Ok(content.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// CommentRenderer
// ---------------------------------------------------------------------------

/// Renders comment bodies that always fit the platform size limit.
///
/// Create once with [`CommentRenderer::new`] and reuse for every directory.
pub struct CommentRenderer {
    engine: TemplateEngine,
    limit: usize,
}

impl CommentRenderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_templates(None)
    }

    /// Embedded templates, overridden by any found in `user_template_dir`.
    pub fn with_templates(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(CommentRenderer {
            engine: TemplateEngine::new(user_template_dir)?,
            limit: MAX_COMMENT_BYTES,
        })
    }

    /// Override the size limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Render `ctx`. When the result is over the limit, every stack diff and
    /// error message is cut on line boundaries to a fair share of the
    /// remaining budget. If that is still not enough the tail of the comment
    /// is dropped, closing any open code block and `<details>`. The marker
    /// line is always kept.
    pub fn render(&self, ctx: &CommentContext) -> Result<String, RenderError> {
        let rendered = self.engine.render(ctx)?;
        if rendered.len() <= self.limit {
            return Ok(rendered);
        }

        let sizes: Vec<usize> = ctx
            .stacks
            .iter()
            .flat_map(|s| [s.body.len(), s.error.as_deref().map_or(0, str::len)])
            .filter(|len| *len > 0)
            .collect();
        let text_bytes: usize = sizes.iter().sum();
        let overhead = rendered.len().saturating_sub(text_bytes);
        let available = self.limit.saturating_sub(overhead + LAYOUT_SLACK);
        let share = fair_share(&sizes, available);

        let mut trimmed = ctx.clone();
        for stack in &mut trimmed.stacks {
            if stack.body.len() > share {
                stack.body = truncate_lines(&stack.body, share);
                stack.truncated = true;
            }
            if let Some(error) = stack.error.as_mut() {
                if error.len() > share {
                    *error = truncate_lines(error, share);
                    stack.truncated = true;
                }
            }
        }

        let rendered = self.engine.render(&trimmed)?;
        if rendered.len() <= self.limit {
            return Ok(rendered);
        }

        let keep = self
            .limit
            .saturating_sub(TRUNCATION_NOTE.len() + CLOSE_BLOCKS.len());
        let mut cut = truncate_at_char_boundary(&rendered, keep).to_string();
        if let Some(end) = cut.rfind('\n') {
            cut.truncate(end + 1);
        }
        close_open_blocks(&mut cut);
        cut.push_str(TRUNCATION_NOTE);
        Ok(cut)
    }
}

/// Largest per-item size such that items at or under it stay whole and the
/// rest are cut to it, with everything fitting `available` bytes.
fn fair_share(sizes: &[usize], available: usize) -> usize {
    let mut sorted = sizes.to_vec();
    sorted.sort_unstable();
    let mut remaining = available;
    for (i, size) in sorted.iter().enumerate() {
        let share = remaining / (sorted.len() - i);
        if *size > share {
            return share;
        }
        remaining -= size;
    }
    usize::MAX
}

/// Terminate a code fence or `<details>` block left open by a hard cut.
fn close_open_blocks(text: &mut String) {
    let fences = text
        .lines()
        .filter(|line| line.trim_start().starts_with("```"))
        .count();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    if fences % 2 == 1 {
        text.push_str("```\n");
    }
    if text.matches("<details").count() > text.matches("</details>").count() {
        text.push_str("</details>\n");
    }
}

/// Longest prefix of whole lines that fits `max` bytes.
fn truncate_lines(text: &str, max: usize) -> String {
    let mut out = String::new();
    for line in text.lines() {
        if out.len() + line.len() + 1 > max {
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    if out.is_empty() {
        return truncate_at_char_boundary(text, max).to_string();
    }
    out.truncate(out.trim_end().len());
    out
}

fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
