//! Subcommands and the options they share.

pub mod run;
pub mod stacks;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use cdkdiff_core::{SelectionCriteria, SelectionStrategy};

/// Which assembly directories to look at and which of their stacks to take.
#[derive(Args, Debug)]
pub struct ScopeArgs {
    /// Repository root the directory pattern is expanded under.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Glob matching synthesized cloud assembly directories.
    #[arg(long, env = "INPUT_CDKOUTDIRS", default_value = "**/cdk.out")]
    pub cdk_out_dirs: String,

    /// Stack selector patterns, separated by commas or newlines.
    #[arg(long, env = "INPUT_STACKSELECTORPATTERNS")]
    pub stack_selector_patterns: Option<String>,

    /// all-stacks, main-assembly, only-single, pattern-match,
    /// pattern-must-match or pattern-must-match-single.
    #[arg(long, env = "INPUT_STACKSELECTIONSTRATEGY", default_value = "all-stacks")]
    pub stack_selection_strategy: SelectionStrategy,
}

impl ScopeArgs {
    /// Absolute repository root.
    pub fn root(&self) -> Result<PathBuf> {
        std::fs::canonicalize(&self.root)
            .with_context(|| format!("repository root {} is not accessible", self.root.display()))
    }

    pub fn criteria(&self) -> SelectionCriteria {
        let patterns = split_list(self.stack_selector_patterns.as_deref().unwrap_or(""));
        let criteria = SelectionCriteria::new(patterns, self.stack_selection_strategy);
        if criteria.strategy() != self.stack_selection_strategy {
            tracing::info!(
                "selector patterns given; using strategy {} instead of {}",
                criteria.strategy(),
                self.stack_selection_strategy
            );
        }
        criteria
    }
}

/// Split a comma- or newline-separated input, dropping blanks.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_split_on_commas_and_newlines() {
        assert_eq!(
            split_list("Prod/*, Shared\n\n  Dev* ,"),
            ["Prod/*", "Shared", "Dev*"]
        );
        assert!(split_list("  ").is_empty());
    }
}
