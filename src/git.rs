//! Minimal git operations behind a trait seam
//!
//! Only the handful of operations the build lane needs: clone a repository,
//! read the local HEAD, refresh remote refs, and ask whether the checkout has
//! fallen behind its upstream. Commands run through [`Invocation`]; tests can
//! substitute a scripted implementation.

use std::path::Path;

use crate::process::{Invocation, ProcessError};

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("git clone of {url} failed: {stderr}")]
    CloneFailed { url: String, stderr: String },

    #[error("Unexpected git output: {0}")]
    Output(String),
}

/// Version-control operations used by the build lane
pub trait Vcs {
    /// Clone `url` under `parent`, optionally checking out `branch` and
    /// naming the checkout `target`
    fn clone_repo(
        &self,
        url: &str,
        parent: &Path,
        branch: Option<&str>,
        target: Option<&str>,
    ) -> Result<(), GitError>;

    /// Full hash of the local HEAD commit
    fn local_head(&self, dir: &Path) -> Result<String, GitError>;

    /// Refresh remote tracking refs
    fn remote_update(&self, dir: &Path) -> Result<(), GitError>;

    /// True when the checkout is behind its upstream branch; a checkout with
    /// no upstream configured is not considered behind
    fn behind_remote(&self, dir: &Path) -> Result<bool, GitError>;
}

/// The real git binary
#[derive(Debug, Default)]
pub struct GitCli;

impl Vcs for GitCli {
    fn clone_repo(
        &self,
        url: &str,
        parent: &Path,
        branch: Option<&str>,
        target: Option<&str>,
    ) -> Result<(), GitError> {
        let mut invocation = Invocation::new("git").current_dir(parent).arg("clone");
        if let Some(branch) = branch {
            invocation = invocation.arg("--branch").arg(branch);
        }
        invocation = invocation.arg(url);
        if let Some(target) = target {
            invocation = invocation.arg(target);
        }

        let output = invocation.run()?;
        if output.success() {
            Ok(())
        } else {
            Err(GitError::CloneFailed {
                url: url.to_string(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn local_head(&self, dir: &Path) -> Result<String, GitError> {
        let output = Invocation::new("git")
            .current_dir(dir)
            .args(["rev-parse", "HEAD"])
            .run_checked()?;
        let head = output.stdout.trim().to_string();
        if head.len() == 40 && head.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(head)
        } else {
            Err(GitError::Output(format!("bad rev-parse output: {head:?}")))
        }
    }

    fn remote_update(&self, dir: &Path) -> Result<(), GitError> {
        Invocation::new("git")
            .current_dir(dir)
            .args(["remote", "update"])
            .run_checked()?;
        Ok(())
    }

    fn behind_remote(&self, dir: &Path) -> Result<bool, GitError> {
        let output = Invocation::new("git")
            .current_dir(dir)
            .args(["rev-list", "--count", "HEAD..@{upstream}"])
            .run()?;
        if !output.success() {
            // No upstream configured; local-only checkouts are never behind.
            return Ok(false);
        }
        let count: u64 = output
            .stdout
            .trim()
            .parse()
            .map_err(|_| GitError::Output(format!("bad rev-list output: {}", output.stdout)))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn git(dir: &Path, args: &[&str]) {
        Invocation::new("git")
            .current_dir(dir)
            .args(args.iter().copied())
            .run_checked()
            .unwrap();
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "--quiet", "--initial-branch=main"]);
        git(dir, &["config", "user.email", "test@test"]);
        git(dir, &["config", "user.name", "test"]);
        fs::write(dir.join("file"), "one\n").unwrap();
        git(dir, &["add", "file"]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
    }

    #[test]
    fn test_clone_and_head() {
        let remote = tempfile::tempdir().unwrap();
        init_repo(remote.path());
        let parent = tempfile::tempdir().unwrap();

        let vcs = GitCli;
        vcs.clone_repo(
            remote.path().to_str().unwrap(),
            parent.path(),
            None,
            Some("checkout"),
        )
        .unwrap();

        let head = vcs.local_head(&parent.path().join("checkout")).unwrap();
        assert_eq!(head.len(), 40);
        assert_eq!(head, vcs.local_head(remote.path()).unwrap());
    }

    #[test]
    fn test_clone_failure_reported() {
        let parent = tempfile::tempdir().unwrap();
        let err = GitCli
            .clone_repo("/nonexistent/repo.git", parent.path(), None, None)
            .unwrap_err();
        assert!(matches!(err, GitError::CloneFailed { .. }));
    }

    #[test]
    fn test_behind_remote_detects_new_upstream_commit() {
        let remote = tempfile::tempdir().unwrap();
        init_repo(remote.path());
        let parent = tempfile::tempdir().unwrap();

        let vcs = GitCli;
        vcs.clone_repo(
            remote.path().to_str().unwrap(),
            parent.path(),
            None,
            Some("checkout"),
        )
        .unwrap();
        let checkout = parent.path().join("checkout");
        assert!(!vcs.behind_remote(&checkout).unwrap());

        fs::write(remote.path().join("file"), "two\n").unwrap();
        git(remote.path(), &["commit", "--quiet", "-am", "second"]);

        vcs.remote_update(&checkout).unwrap();
        assert!(vcs.behind_remote(&checkout).unwrap());
    }

    #[test]
    fn test_behind_remote_without_upstream_is_false() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        assert!(!GitCli.behind_remote(dir.path()).unwrap());
    }
}
