//! `cdkdiff stacks`: show what selection picks in each assembly directory.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use cdkdiff_core::{selection, Stack};
use cdkdiff_detector::expand;

use super::ScopeArgs;

/// Arguments for `cdkdiff stacks`.
#[derive(Args, Debug)]
pub struct StacksArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StackRow {
    #[tabled(rename = "stack")]
    display_name: String,
    #[tabled(rename = "stack name")]
    stack_name: String,
    #[tabled(rename = "assembly")]
    assembly: String,
    #[tabled(rename = "depends on")]
    dependencies: String,
}

impl StacksArgs {
    pub fn run(self) -> Result<()> {
        let root = self.scope.root()?;
        let criteria = self.scope.criteria();
        let directories = expand(&root, &self.scope.cdk_out_dirs)?;
        if directories.is_empty() {
            anyhow::bail!(
                "no directories matched '{}' under {}",
                self.scope.cdk_out_dirs,
                root.display()
            );
        }

        let mut selected = Vec::with_capacity(directories.len());
        for directory in directories {
            let stacks = selection::select(&directory, &criteria)
                .with_context(|| format!("stack selection failed for {directory}"))?;
            selected.push((directory, stacks));
        }

        if self.json {
            let payload: Vec<serde_json::Value> = selected
                .iter()
                .map(|(directory, stacks)| {
                    serde_json::json!({
                        "directory": directory.display_path(),
                        "strategy": criteria.strategy().as_str(),
                        "stacks": stacks.iter().map(stack_json).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize stacks JSON")?
            );
            return Ok(());
        }

        for (directory, stacks) in selected {
            println!(
                "{} {}",
                directory.display_path().bold(),
                format!("({} stack(s), {})", stacks.len(), criteria.strategy()).bright_black()
            );
            if stacks.is_empty() {
                println!("  no stacks selected");
                continue;
            }
            let rows: Vec<StackRow> = stacks.iter().map(stack_row).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        Ok(())
    }
}

fn stack_row(stack: &Stack) -> StackRow {
    StackRow {
        display_name: stack.display_name.clone(),
        stack_name: stack.stack_name.clone(),
        assembly: (if stack.top_level { "top-level" } else { "nested" }).to_string(),
        dependencies: stack
            .dependencies
            .iter()
            .map(|d| d.0.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn stack_json(stack: &Stack) -> serde_json::Value {
    serde_json::json!({
        "id": stack.id.0,
        "displayName": stack.display_name,
        "stackName": stack.stack_name,
        "topLevel": stack.top_level,
        "dependencies": stack.dependencies.iter().map(|d| d.0.as_str()).collect::<Vec<_>>(),
    })
}
