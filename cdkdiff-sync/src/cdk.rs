//! [`DiffEngine`] backed by the `cdk` command line.
//!
//! Each stack is diffed against the synthesized assembly with
//! `cdk diff --app <dir> --exclusively <stack>`. The CLI prints the diff on
//! stderr, so both streams are captured and parsed together.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use cdkdiff_core::{CandidateDirectory, ChangeImpact, DestructiveChange, DiffMethod, Stack};

use crate::diff::{DiffEngine, EngineOutput};
use crate::error::EngineError;

/// Default command: the project-local CDK through npx.
pub const DEFAULT_CDK_COMMAND: &str = "npx cdk";

const NO_DIFFERENCES: &[&str] = &[
    "There were no differences",
    "Number of stacks with differences: 0",
];

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI escape pattern")
});

/// `[-] AWS::S3::Bucket Bucket Bucket83908E77 destroy`
static RESOURCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\[(?P<op>[-~+])\]\s+(?P<type>[A-Za-z0-9]+::[A-Za-z0-9]+::[A-Za-z0-9:]+)\s+\S+\s+(?P<id>\S+)(?:\s+(?P<note>.+))?$",
    )
    .expect("valid resource line pattern")
});

// ---------------------------------------------------------------------------
// CdkCli
// ---------------------------------------------------------------------------

pub struct CdkCli {
    command: Vec<String>,
    /// `--version` output per project directory, filled by `prepare`.
    versions: RefCell<HashMap<PathBuf, String>>,
}

impl CdkCli {
    /// Split a whitespace-separated command line such as `npx cdk`.
    pub fn new(command_line: &str) -> Result<Self, EngineError> {
        let command: Vec<String> = command_line.split_whitespace().map(str::to_string).collect();
        if command.is_empty() {
            return Err(EngineError::EmptyCommand);
        }
        Ok(CdkCli {
            command,
            versions: RefCell::new(HashMap::new()),
        })
    }

    /// Version reported by the CLI for `directory`'s project, once `prepare`
    /// has run there.
    pub fn version(&self, directory: &CandidateDirectory) -> Option<String> {
        self.versions.borrow().get(directory.project_dir()).cloned()
    }

    fn run(&self, directory: &CandidateDirectory, args: &[&str]) -> Result<String, EngineError> {
        let (program, prefix) = self
            .command
            .split_first()
            .ok_or(EngineError::EmptyCommand)?;
        let output = Command::new(program)
            .args(prefix)
            .args(args)
            .current_dir(directory.project_dir())
            .env("NO_COLOR", "1")
            .env("CI", "true")
            .output()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let text = ANSI.replace_all(&text, "").replace("\r\n", "\n");

        if !output.status.success() {
            return Err(EngineError::Failed {
                command: format!("{} {}", self.command.join(" "), args.join(" ")),
                status: output.status.code(),
                output: text.trim().to_string(),
            });
        }
        Ok(text)
    }
}

impl DiffEngine for CdkCli {
    fn prepare(&self, directory: &CandidateDirectory) -> Result<(), EngineError> {
        let project = directory.project_dir();
        if self.versions.borrow().contains_key(project) {
            return Ok(());
        }
        let version = self.run(directory, &["--version"])?;
        let version = version.trim().to_string();
        tracing::info!(directory = %directory, version = %version, "cdk command ready");
        self.versions
            .borrow_mut()
            .insert(project.to_path_buf(), version);
        Ok(())
    }

    fn diff(
        &self,
        directory: &CandidateDirectory,
        stack: &Stack,
        method: DiffMethod,
    ) -> Result<EngineOutput, EngineError> {
        let app = directory.path().to_string_lossy().into_owned();
        let method_flag = match method {
            DiffMethod::ChangeSet => "--change-set",
            DiffMethod::TemplateOnly => "--no-change-set",
        };
        let raw = self.run(
            directory,
            &[
                "diff",
                "--app",
                &app,
                "--exclusively",
                &stack.display_name,
                method_flag,
                "--no-color",
            ],
        )?;
        Ok(parse_output(&raw))
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// Interpret the text printed by `cdk diff` for one stack.
pub fn parse_output(raw: &str) -> EngineOutput {
    let has_changes = !NO_DIFFERENCES.iter().any(|marker| raw.contains(marker));
    EngineOutput {
        has_changes,
        body: if has_changes {
            format_body(raw)
        } else {
            String::new()
        },
        raw: raw.to_string(),
        destructive: destructive_changes(raw),
    }
}

/// Resources removed or replaced, in output order.
pub fn destructive_changes(raw: &str) -> Vec<DestructiveChange> {
    raw.lines()
        .filter_map(|line| {
            let caps = RESOURCE_LINE.captures(line)?;
            let note = caps.name("note").map(|m| m.as_str().trim()).unwrap_or("");
            let impact = match (&caps["op"], note) {
                (_, n) if n.contains("may be replaced") || n.contains("may replace") => {
                    ChangeImpact::MayReplace
                }
                (_, n) if n.starts_with("replace") => ChangeImpact::Replace,
                // Retained resources are dropped from the template only.
                ("-", n) if n.starts_with("orphan") || n.starts_with("retain") => return None,
                ("-", _) => ChangeImpact::Destroy,
                _ => return None,
            };
            Some(DestructiveChange {
                logical_id: caps["id"].to_string(),
                resource_type: caps["type"].to_string(),
                impact,
            })
        })
        .collect()
}

/// Prefix each line so a `diff` fence colors removals, additions and
/// modifications.
fn format_body(raw: &str) -> String {
    let lines: Vec<String> = raw
        .lines()
        .filter(|line| !line.contains("Number of stacks with differences"))
        .map(|line| {
            let trimmed = line.trim_start_matches(|c: char| {
                c.is_whitespace() || matches!(c, '└' | '├' | '│' | '─')
            });
            let sign = if trimmed.starts_with("[-]") {
                '-'
            } else if trimmed.starts_with("[+]") {
                '+'
            } else if trimmed.starts_with("[~]") {
                '!'
            } else {
                ' '
            };
            format!("{sign}{line}").trim_end().to_string()
        })
        .collect();

    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
