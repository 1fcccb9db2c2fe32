//! cdkdiff: post CDK stack diffs of changed projects to a pull request.
//!
//! # Usage
//!
//! ```text
//! cdkdiff run [--cdk-out-dirs <glob>] [--base-ref <ref>] [--stack-selector-patterns <list>]
//!             [--stack-selection-strategy <strategy>] [--diff-method change-set|template-only]
//!             [--title <title>] [--dry-run] [--fail-on-destructive-changes]
//! cdkdiff stacks [--cdk-out-dirs <glob>] [--stack-selector-patterns <list>] [--json]
//! ```
//!
//! Every `run` option can also be supplied as a GitHub Actions input
//! (`INPUT_<NAME>` environment variable).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run::RunArgs, stacks::StacksArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cdkdiff",
    version,
    about = "Comment CDK stack diffs for changed projects on a pull request",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diff the selected stacks of every changed assembly and upsert one
    /// comment per assembly directory.
    Run(RunArgs),

    /// List the stacks a run would select, without diffing.
    Stacks(StacksArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Stacks(args) => args.run(),
    }
}
