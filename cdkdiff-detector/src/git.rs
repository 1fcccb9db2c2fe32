//! `git` subprocess adapter for [`ChangeDetector`].

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{ChangeDetector, VcsError};

/// Runs `git diff --name-only <base> HEAD -- <path>` inside `repo_root`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            program: "git".to_string(),
        }
    }

    /// Use a different executable instead of `git` on `$PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl ChangeDetector for GitCli {
    fn changed_paths(&self, base_ref: &str, path: &Path) -> Result<Vec<PathBuf>, VcsError> {
        let relative = path.strip_prefix(&self.repo_root).unwrap_or(path);
        let scope = if relative.as_os_str().is_empty() {
            Path::new(".")
        } else {
            relative
        };

        let output = Command::new(&self.program)
            .args(["diff", "--name-only", base_ref, "HEAD", "--"])
            .arg(scope)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| VcsError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(VcsError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "-q"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        fs::create_dir_all(dir.path().join("api")).unwrap();
        fs::create_dir_all(dir.path().join("web")).unwrap();
        fs::write(dir.path().join("api").join("app.ts"), "v1").unwrap();
        fs::write(dir.path().join("web").join("app.ts"), "v1").unwrap();
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "-q", "-m", "initial"]);
        run_git(dir.path(), &["tag", "base"]);
        dir
    }

    #[test]
    fn reports_only_paths_under_the_project() {
        let repo = make_repo();
        fs::write(repo.path().join("api").join("app.ts"), "v2").unwrap();
        run_git(repo.path(), &["commit", "-q", "-am", "change api"]);

        let git = GitCli::new(repo.path());
        let api = git
            .changed_paths("base", &repo.path().join("api"))
            .expect("diff api");
        assert_eq!(api, vec![PathBuf::from("api/app.ts")]);

        let web = git
            .changed_paths("base", &repo.path().join("web"))
            .expect("diff web");
        assert!(web.is_empty());
    }

    #[test]
    fn unknown_ref_is_an_error() {
        let repo = make_repo();
        let git = GitCli::new(repo.path());
        let err = git
            .changed_paths("no-such-ref", &repo.path().join("api"))
            .unwrap_err();
        assert!(matches!(err, VcsError::Failed { .. }));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let repo = TempDir::new().unwrap();
        let git = GitCli::new(repo.path()).with_program("definitely-not-git-cdkdiff");
        let err = git.changed_paths("origin/main", repo.path()).unwrap_err();
        assert!(matches!(err, VcsError::Spawn { .. }));
    }
}
