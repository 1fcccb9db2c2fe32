//! `cdkdiff run`: diff changed assemblies and upsert pull request comments.

use std::cell::Cell;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use cdkdiff_core::DiffMethod;
use cdkdiff_detector::GitCli;
use cdkdiff_renderer::CommentRenderer;
use cdkdiff_sync::{
    cdk::DEFAULT_CDK_COMMAND, github::DEFAULT_API_URL, pipeline, CdkCli, Collaborators,
    CommentError, CommentHandle, CommentStore, DestructivePolicy, GithubComments,
    PullRequestRef, RunConfig, RunSummary, UpsertResult,
};

use super::{split_list, ScopeArgs};

/// Arguments for `cdkdiff run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Token used to read and write pull request comments.
    #[arg(long, env = "INPUT_GITHUBTOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Ref the working tree is compared against to find changed projects.
    #[arg(long, env = "INPUT_BASEREF", default_value = "origin/main")]
    pub base_ref: String,

    /// change-set or template-only. Anything else falls back to change-set.
    #[arg(long, env = "INPUT_DIFFMETHOD", default_value = "change-set")]
    pub diff_method: String,

    /// Heading for the comment; also part of the comment identity.
    #[arg(long, env = "INPUT_TITLE")]
    pub title: Option<String>,

    /// Print comments to stdout instead of writing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Pull request number (default: read from the Actions event payload).
    #[arg(long, env = "INPUT_PRNUMBER")]
    pub pr_number: Option<u64>,

    /// Repository as owner/name.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// Actions event payload carrying the pull request number.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Command used to invoke the CDK CLI.
    #[arg(long, env = "INPUT_CDKCOMMAND", default_value = DEFAULT_CDK_COMMAND)]
    pub cdk_command: String,

    /// Directory of `.tera` files overriding the built-in comment templates.
    #[arg(long)]
    pub template_dir: Option<PathBuf>,

    /// Fail after commenting when a resource would be destroyed or replaced.
    #[arg(long, env = "INPUT_FAILONDESTRUCTIVECHANGES")]
    pub fail_on_destructive_changes: bool,

    /// CloudFormation resource types exempt from the destructive-change check.
    #[arg(long, env = "INPUT_ALLOWEDDESTROYTYPES", value_delimiter = ',')]
    pub allowed_destroy_types: Vec<String>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config()?;
        let comments = self.comment_store()?;
        let engine = CdkCli::new(&self.cdk_command).context("invalid --cdk-command")?;
        let vcs = GitCli::new(config.root.clone());
        let renderer = CommentRenderer::with_templates(self.template_dir.as_deref())
            .context("failed to load comment templates")?;

        let collaborators = Collaborators {
            vcs: &vcs,
            engine: &engine,
            comments: &*comments,
        };
        let summary = pipeline::run(&config, &collaborators, &renderer)?;

        print_summary(&summary, &config, self.dry_run);
        summary.enforce(&config.destructive)?;
        Ok(())
    }

    fn config(&self) -> Result<RunConfig> {
        let (method, recognised) = DiffMethod::from_input(&self.diff_method);
        if !recognised {
            tracing::warn!(
                "unknown diff method '{}', using {}",
                self.diff_method,
                method
            );
        }
        Ok(RunConfig {
            root: self.scope.root()?,
            cdk_out_dirs: self.scope.cdk_out_dirs.clone(),
            base_ref: self.base_ref.clone(),
            selection: self.scope.criteria(),
            method,
            title: self
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            destructive: DestructivePolicy {
                fail: self.fail_on_destructive_changes,
                allowed_types: self
                    .allowed_destroy_types
                    .iter()
                    .flat_map(|t| split_list(t))
                    .collect(),
            },
        })
    }

    fn comment_store(&self) -> Result<Box<dyn CommentStore>> {
        if self.dry_run {
            return Ok(Box::new(DryRunComments::default()));
        }

        let token = self
            .github_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .context("a GitHub token is required unless --dry-run is given (--github-token or INPUT_GITHUBTOKEN)")?;
        let repository = self
            .repository
            .as_deref()
            .context("repository unknown: pass --repository or set GITHUB_REPOSITORY")?;
        let number = match (self.pr_number, self.event_path.as_deref()) {
            (Some(n), _) => n,
            (None, Some(path)) => PullRequestRef::number_from_event(path)
                .context("could not determine the pull request number")?,
            (None, None) => {
                bail!("pull request unknown: pass --pr-number or run from a pull_request event")
            }
        };
        let pr = PullRequestRef::parse(repository, number)?;
        tracing::info!("commenting on {}/{}#{}", pr.owner, pr.repo, pr.number);
        Ok(Box::new(GithubComments::new(&self.api_url, token, pr)))
    }
}

// ---------------------------------------------------------------------------
// Dry-run store
// ---------------------------------------------------------------------------

/// Prints comment bodies instead of writing them. Never finds an existing
/// comment, so every directory reports a create.
#[derive(Default)]
struct DryRunComments {
    printed: Cell<u64>,
}

impl DryRunComments {
    fn print(&self, body: &str) -> CommentHandle {
        let id = self.printed.get() + 1;
        self.printed.set(id);
        println!("{}", format!("--- comment {id} ---").bright_black());
        println!("{body}");
        CommentHandle { id }
    }
}

impl CommentStore for DryRunComments {
    fn find_existing(&self, _key: &str) -> Result<Option<CommentHandle>, CommentError> {
        Ok(None)
    }

    fn create(&self, body: &str) -> Result<CommentHandle, CommentError> {
        Ok(self.print(body))
    }

    fn update(&self, _handle: CommentHandle, body: &str) -> Result<CommentHandle, CommentError> {
        Ok(self.print(body))
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "directory")]
    directory: String,
    #[tabled(rename = "stacks")]
    stacks: usize,
    #[tabled(rename = "changed")]
    changed: usize,
    #[tabled(rename = "unchanged")]
    unchanged: usize,
    #[tabled(rename = "errors")]
    errors: usize,
    #[tabled(rename = "destructive")]
    destructive: usize,
    #[tabled(rename = "comment")]
    comment: String,
}

fn print_summary(summary: &RunSummary, config: &RunConfig, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if summary.is_noop() {
        println!(
            "{prefix}✓ {} assembly director{} matched, none changed since {}; nothing to comment",
            summary.matched,
            if summary.matched == 1 { "y" } else { "ies" },
            config.base_ref
        );
        return;
    }

    let rows: Vec<SummaryRow> = summary
        .directories
        .iter()
        .map(|report| SummaryRow {
            directory: report.directory.display_path().to_string(),
            stacks: report.results.len(),
            changed: report.changed(),
            unchanged: report.unchanged(),
            errors: report.errors(),
            destructive: report
                .results
                .iter()
                .map(|r| r.destructive_changes.len())
                .sum(),
            comment: match (dry_run, report.comment) {
                (true, _) => "printed".to_string(),
                (false, UpsertResult::Created { id }) => format!("created #{id}"),
                (false, UpsertResult::Updated { id }) => format!("updated #{id}"),
            },
        })
        .collect();

    println!(
        "{prefix}✓ {} of {} assembly directories changed ({} method)",
        summary.directories.len(),
        summary.matched,
        config.method
    );
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for report in &summary.directories {
        for result in report.results.iter().filter(|r| r.is_error()) {
            println!(
                "  {} {} in {}",
                "✗".red(),
                result.stack.display_name,
                report.directory.display_path()
            );
        }
    }

    let blocked = summary.blocked_changes(&config.destructive);
    if !blocked.is_empty() {
        let line = format!("{} destructive change(s) detected", blocked.len());
        println!("{}", line.yellow().bold());
    }
}
