//! Change scope resolution tests with a scripted change detector.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use cdkdiff_core::ChangeEvidence;
use cdkdiff_detector::{expand, resolve, ChangeDetector, ResolveError, VcsError};
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Answers per project directory name; records every query.
#[derive(Default)]
struct ScriptedVcs {
    changed: HashMap<String, Vec<PathBuf>>,
    failing: Vec<String>,
    calls: RefCell<Vec<(String, PathBuf)>>,
}

impl ChangeDetector for ScriptedVcs {
    fn changed_paths(&self, base_ref: &str, path: &Path) -> Result<Vec<PathBuf>, VcsError> {
        self.calls
            .borrow_mut()
            .push((base_ref.to_string(), path.to_path_buf()));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(VcsError::Failed {
                status: Some(128),
                stderr: "fatal: bad revision".to_string(),
            });
        }
        Ok(self.changed.get(&name).cloned().unwrap_or_default())
    }
}

fn make_tree(dirs: &[&str]) -> TempDir {
    let root = TempDir::new().expect("tempdir");
    for dir in dirs {
        fs::create_dir_all(root.path().join(dir)).expect("mkdir");
    }
    root
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

#[rstest]
#[case("**/cdk.out", &["a/cdk.out", "b/cdk.out", "nested/c/cdk.out"])]
#[case("a/cdk.out", &["a/cdk.out"])]
#[case("*/cdk.out", &["a/cdk.out", "b/cdk.out"])]
fn expansion_keeps_glob_order(#[case] pattern: &str, #[case] expected: &[&str]) {
    let root = make_tree(&["b/cdk.out", "a/cdk.out", "nested/c/cdk.out", ".hidden/cdk.out"]);
    let found: Vec<String> = expand(root.path(), pattern)
        .expect("expand")
        .iter()
        .map(|d| d.display_path().to_string())
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn files_named_like_assemblies_are_dropped() {
    let root = make_tree(&["a/cdk.out"]);
    fs::create_dir_all(root.path().join("b")).unwrap();
    fs::write(root.path().join("b").join("cdk.out"), "file").unwrap();
    let found = expand(root.path(), "**/cdk.out").expect("expand");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].display_path(), "a/cdk.out");
}

#[test]
fn invalid_pattern_is_a_configuration_error() {
    let root = make_tree(&[]);
    let err = expand(root.path(), "[cdk.out").unwrap_err();
    assert!(matches!(err, ResolveError::Pattern { .. }));
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn only_changed_projects_survive() {
    let root = make_tree(&["a/cdk.out", "b/cdk.out"]);
    let mut vcs = ScriptedVcs::default();
    vcs.changed
        .insert("a".to_string(), vec![PathBuf::from("a/lib/stack.ts")]);

    let resolution = resolve(root.path(), "**/cdk.out", "origin/main", &vcs).expect("resolve");
    assert_eq!(resolution.matched(), 2);
    let changed: Vec<String> = resolution
        .changed()
        .iter()
        .map(|d| d.display_path().to_string())
        .collect();
    assert_eq!(changed, ["a/cdk.out"]);

    let calls = vcs.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(base, _)| base == "origin/main"));
    assert!(calls[0].1.ends_with("a"), "owning project is the parent dir");
}

#[test]
fn no_matches_is_an_error() {
    let root = make_tree(&["a"]);
    let vcs = ScriptedVcs::default();
    let err = resolve(root.path(), "**/cdk.out", "origin/main", &vcs).unwrap_err();
    assert!(matches!(err, ResolveError::NoMatches { .. }));
    assert!(vcs.calls.borrow().is_empty(), "no comparison before matching");
}

#[test]
fn nothing_changed_is_not_an_error() {
    let root = make_tree(&["a/cdk.out"]);
    let vcs = ScriptedVcs::default();
    let resolution = resolve(root.path(), "**/cdk.out", "origin/main", &vcs).expect("resolve");
    assert_eq!(resolution.matched(), 1);
    assert!(resolution.changed().is_empty());
    assert_eq!(
        resolution.candidates[0].decision.evidence,
        ChangeEvidence::NoDifferences
    );
}

#[test]
fn failed_comparison_fails_open() {
    let root = make_tree(&["a/cdk.out", "b/cdk.out"]);
    let vcs = ScriptedVcs {
        failing: vec!["b".to_string()],
        ..Default::default()
    };
    let resolution = resolve(root.path(), "**/cdk.out", "origin/main", &vcs).expect("resolve");
    let changed = resolution.changed();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].display_path(), "b/cdk.out");
    assert!(matches!(
        resolution.candidates[1].decision.evidence,
        ChangeEvidence::DetectionFailed(_)
    ));
}
