//! Domain types shared across the cdkdiff workspace.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Free-form configuration strings are parsed into the closed enums here before
//! they reach any pipeline logic.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Artifact identifier of a stack inside a cloud assembly manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(pub String);

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for StackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StackId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Candidate directories
// ---------------------------------------------------------------------------

/// A directory believed to hold a synthesized cloud assembly (`cdk.out`).
///
/// Only constructed through [`CandidateDirectory::from_match`], which checks
/// that the path exists and is a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDirectory {
    path: PathBuf,
    display: String,
}

impl CandidateDirectory {
    /// Validate a glob match. `root` is only used to derive the display path.
    pub fn from_match(root: &Path, path: PathBuf) -> Option<Self> {
        if !path.is_dir() {
            return None;
        }
        let relative = path.strip_prefix(root).unwrap_or(path.as_path());
        let display = relative.to_string_lossy().replace('\\', "/");
        Some(Self { path, display })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the repository root, `/`-separated.
    pub fn display_path(&self) -> &str {
        &self.display
    }

    /// The application project owning this assembly: its parent directory.
    pub fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or(self.path.as_path())
    }
}

impl fmt::Display for CandidateDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Why a candidate directory was or was not considered changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvidence {
    /// The VCS reported these paths as different from the base ref.
    Paths(Vec<PathBuf>),
    /// The VCS reported no differences.
    NoDifferences,
    /// The comparison could not run; treated as changed.
    DetectionFailed(String),
}

/// Outcome of comparing a directory's owning project against the base ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDecision {
    pub changed: bool,
    pub evidence: ChangeEvidence,
}

impl ChangeDecision {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        if paths.is_empty() {
            Self {
                changed: false,
                evidence: ChangeEvidence::NoDifferences,
            }
        } else {
            Self {
                changed: true,
                evidence: ChangeEvidence::Paths(paths),
            }
        }
    }

    /// Fail-open decision used when the comparison itself could not execute.
    pub fn detection_failed(reason: impl Into<String>) -> Self {
        Self {
            changed: true,
            evidence: ChangeEvidence::DetectionFailed(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Stacks
// ---------------------------------------------------------------------------

/// A deployable unit inside a cloud assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    /// Artifact id from the manifest (e.g. `ProdApiStack1234`).
    pub id: StackId,
    /// Hierarchical display name (e.g. `Prod/Api`); what selector patterns match.
    pub display_name: String,
    /// Deployed CloudFormation stack name.
    pub stack_name: String,
    /// Template file, relative to `assembly_dir`.
    pub template_file: PathBuf,
    /// Directory of the (possibly nested) assembly declaring this stack.
    pub assembly_dir: PathBuf,
    /// True when declared by the top-level assembly rather than a nested stage.
    pub top_level: bool,
    /// Artifact ids this stack depends on.
    pub dependencies: Vec<StackId>,
}

impl Stack {
    pub fn template_path(&self) -> PathBuf {
        self.assembly_dir.join(&self.template_file)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// How the selector patterns are applied to an assembly's stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Every stack, nested assemblies included. Patterns are ignored.
    #[default]
    AllStacks,
    /// Stacks of the top-level assembly only.
    MainAssembly,
    /// The top-level assembly must hold exactly one stack.
    OnlySingle,
    /// Stacks matching any pattern; an empty selection is fine.
    PatternMatch,
    /// Stacks matching any pattern; at least one must match.
    PatternMustMatch,
    /// Stacks matching any pattern; exactly one must match.
    PatternMustMatchSingle,
}

impl SelectionStrategy {
    pub fn all() -> &'static [SelectionStrategy] {
        &[
            SelectionStrategy::AllStacks,
            SelectionStrategy::MainAssembly,
            SelectionStrategy::OnlySingle,
            SelectionStrategy::PatternMatch,
            SelectionStrategy::PatternMustMatch,
            SelectionStrategy::PatternMustMatchSingle,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::AllStacks => "all-stacks",
            SelectionStrategy::MainAssembly => "main-assembly",
            SelectionStrategy::OnlySingle => "only-single",
            SelectionStrategy::PatternMatch => "pattern-match",
            SelectionStrategy::PatternMustMatch => "pattern-must-match",
            SelectionStrategy::PatternMustMatchSingle => "pattern-must-match-single",
        }
    }

    /// Whether the strategy filters by the selector patterns at all.
    pub fn uses_patterns(&self) -> bool {
        matches!(
            self,
            SelectionStrategy::PatternMatch
                | SelectionStrategy::PatternMustMatch
                | SelectionStrategy::PatternMustMatchSingle
        )
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown strategies fail fast; there is no sensible fallback.
impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        SelectionStrategy::all()
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == needle)
            .ok_or_else(|| {
                let expected: Vec<&str> =
                    SelectionStrategy::all().iter().map(|s| s.as_str()).collect();
                format!(
                    "unknown stack selection strategy '{s}'; expected one of: {}",
                    expected.join(", ")
                )
            })
    }
}

/// Patterns plus strategy. Build with [`SelectionCriteria::new`] so the
/// upgrade rule is always applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionCriteria {
    patterns: Vec<String>,
    strategy: SelectionStrategy,
}

impl SelectionCriteria {
    /// Non-empty patterns combined with `AllStacks` become `PatternMustMatch`.
    pub fn new(patterns: Vec<String>, strategy: SelectionStrategy) -> Self {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let strategy = if !patterns.is_empty() && strategy == SelectionStrategy::AllStacks {
            SelectionStrategy::PatternMustMatch
        } else {
            strategy
        };
        Self { patterns, strategy }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }
}

// ---------------------------------------------------------------------------
// Diff method + results
// ---------------------------------------------------------------------------

/// How the diff engine compares a stack with its deployed counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DiffMethod {
    /// Creates a CloudFormation change set: needs deploy-level access, sees
    /// resource replacements.
    #[default]
    ChangeSet,
    /// Compares templates only: read access, no replacement semantics.
    TemplateOnly,
}

impl DiffMethod {
    /// Lenient parse: anything that is not recognisably template-only maps
    /// to `ChangeSet`. The second element is `false` when the input was not
    /// recognised, so callers can warn.
    pub fn from_input(input: &str) -> (Self, bool) {
        match input.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "change-set" | "changeset" => (DiffMethod::ChangeSet, true),
            "template-only" | "template" => (DiffMethod::TemplateOnly, true),
            _ => (DiffMethod::ChangeSet, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiffMethod::ChangeSet => "change-set",
            DiffMethod::TemplateOnly => "template-only",
        }
    }

    /// Whether the engine can report resource replacements with this method.
    pub fn detects_replacements(&self) -> bool {
        matches!(self, DiffMethod::ChangeSet)
    }
}

impl fmt::Display for DiffMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of destructive change reported for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeImpact {
    Destroy,
    Replace,
    MayReplace,
}

impl fmt::Display for ChangeImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeImpact::Destroy => write!(f, "destroy"),
            ChangeImpact::Replace => write!(f, "replace"),
            ChangeImpact::MayReplace => write!(f, "may replace"),
        }
    }
}

/// A resource the diff says would be removed or replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructiveChange {
    pub logical_id: String,
    pub resource_type: String,
    pub impact: ChangeImpact,
}

/// Per-stack diff outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Changed,
    Unchanged,
    Error { message: String },
}

/// One stack's diff, as consumed by the comment renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub stack: Stack,
    pub outcome: DiffOutcome,
    /// Markdown-ready diff text (diff-fenced lines).
    pub body: String,
    /// Engine output exactly as produced.
    pub raw: String,
    pub destructive_changes: Vec<DestructiveChange>,
    /// False when the method cannot see replacements (template-only).
    pub replacements_known: bool,
}

impl DiffResult {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, DiffOutcome::Error { .. })
    }

    pub fn has_changes(&self) -> bool {
        matches!(self.outcome, DiffOutcome::Changed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_upgrade_all_stacks_to_must_match() {
        let criteria =
            SelectionCriteria::new(vec!["Prod/*".to_string()], SelectionStrategy::AllStacks);
        assert_eq!(criteria.strategy(), SelectionStrategy::PatternMustMatch);
    }

    #[test]
    fn empty_patterns_keep_all_stacks() {
        let criteria = SelectionCriteria::new(vec![" ".to_string()], SelectionStrategy::AllStacks);
        assert_eq!(criteria.strategy(), SelectionStrategy::AllStacks);
        assert!(criteria.patterns().is_empty());
    }

    #[test]
    fn explicit_pattern_strategy_is_not_changed() {
        let criteria =
            SelectionCriteria::new(vec!["Api".to_string()], SelectionStrategy::PatternMatch);
        assert_eq!(criteria.strategy(), SelectionStrategy::PatternMatch);
    }

    #[test]
    fn strategy_parses_kebab_and_snake_case() {
        assert_eq!(
            "pattern-must-match-single".parse::<SelectionStrategy>(),
            Ok(SelectionStrategy::PatternMustMatchSingle)
        );
        assert_eq!(
            "MAIN_ASSEMBLY".parse::<SelectionStrategy>(),
            Ok(SelectionStrategy::MainAssembly)
        );
        assert!("everything".parse::<SelectionStrategy>().is_err());
    }

    #[test]
    fn unknown_diff_method_defaults_to_change_set() {
        assert_eq!(DiffMethod::from_input("bogus"), (DiffMethod::ChangeSet, false));
        assert_eq!(
            DiffMethod::from_input("template-only"),
            (DiffMethod::TemplateOnly, true)
        );
        assert!(!DiffMethod::TemplateOnly.detects_replacements());
    }

    #[test]
    fn change_decision_from_paths() {
        assert!(!ChangeDecision::from_paths(vec![]).changed);
        let decision = ChangeDecision::from_paths(vec![PathBuf::from("app/lib/stack.ts")]);
        assert!(decision.changed);
        assert!(ChangeDecision::detection_failed("git missing").changed);
    }

    #[test]
    fn candidate_directory_rejects_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("cdk.out");
        std::fs::write(&file, "not a dir").unwrap();
        assert!(CandidateDirectory::from_match(tmp.path(), file).is_none());

        let dir = tmp.path().join("app").join("cdk.out");
        std::fs::create_dir_all(&dir).unwrap();
        let candidate = CandidateDirectory::from_match(tmp.path(), dir).expect("dir");
        assert_eq!(candidate.display_path(), "app/cdk.out");
        assert!(candidate.project_dir().ends_with("app"));
    }
}
