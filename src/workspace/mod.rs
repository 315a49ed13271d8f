//! Build workspace resolution
//!
//! Every build command runs against a per-package checkout under the build
//! root. Resolution is idempotent: an existing checkout is refreshed and
//! checked for divergence (the user must explicitly confirm building from a
//! stale checkout; the default answer aborts), a missing one is located in
//! the package index and cloned. A failed clone removes the partial
//! directory and ends the run cleanly.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::LaneConfig;
use crate::git::{GitError, Vcs};
use crate::index::{IndexError, PackageIndex};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A resolved per-package checkout
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub module: String,
}

impl Workspace {
    pub fn module_dir(&self) -> PathBuf {
        self.root.join(&self.module)
    }
}

/// Why resolution ended without a usable workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnknownPackage(String),
    DivergenceAborted(String),
    CloneFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnknownPackage(module) => {
                write!(f, "Package {module} is not in the package index")
            }
            SkipReason::DivergenceAborted(module) => {
                write!(f, "Aborted: local checkout of {module} is behind its remote")
            }
            SkipReason::CloneFailed(module) => {
                write!(f, "Could not clone {module}; partial checkout removed")
            }
        }
    }
}

#[derive(Debug)]
pub enum Resolution {
    Ready(Workspace),
    Skipped(SkipReason),
}

/// Interactive yes/no gate; the default answer is no
pub trait Prompter {
    fn confirm(&self, question: &str) -> bool;
}

/// Reads the answer from stdin
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str) -> bool {
        eprint!("{question} (y/N): ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

pub struct WorkspaceManager<'a> {
    config: &'a LaneConfig,
    vcs: &'a dyn Vcs,
    index: &'a dyn PackageIndex,
    prompter: &'a dyn Prompter,
}

impl<'a> WorkspaceManager<'a> {
    pub fn new(
        config: &'a LaneConfig,
        vcs: &'a dyn Vcs,
        index: &'a dyn PackageIndex,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            config,
            vcs,
            index,
            prompter,
        }
    }

    /// Resolve the checkout for `module`, cloning it if necessary
    pub fn ensure(&self, module: &str) -> Result<Resolution, WorkspaceError> {
        let root = &self.config.build_root;
        std::fs::create_dir_all(root).map_err(|source| WorkspaceError::Io {
            path: root.clone(),
            source,
        })?;

        let workspace = Workspace {
            root: root.clone(),
            module: module.to_string(),
        };
        let module_dir = workspace.module_dir();

        if module_dir.is_dir() {
            self.vcs.remote_update(&module_dir)?;
            if self.vcs.behind_remote(&module_dir)? {
                let question = format!(
                    "Local checkout of {module} is behind its remote. Build from it anyway?"
                );
                if !self.prompter.confirm(&question) {
                    return Ok(Resolution::Skipped(SkipReason::DivergenceAborted(
                        module.to_string(),
                    )));
                }
            }
            return Ok(Resolution::Ready(workspace));
        }

        let project = match self.index.find_exact(module)? {
            Some(project) => project,
            None => {
                return Ok(Resolution::Skipped(SkipReason::UnknownPackage(
                    module.to_string(),
                )))
            }
        };

        info!(module, url = %project.git_url, "cloning package checkout");
        match self
            .vcs
            .clone_repo(&project.git_url, root, None, Some(module))
        {
            Ok(()) => Ok(Resolution::Ready(workspace)),
            Err(err) => {
                warn!(module, error = %err, "clone failed, removing partial checkout");
                if module_dir.exists() {
                    std::fs::remove_dir_all(&module_dir).map_err(|source| WorkspaceError::Io {
                        path: module_dir.clone(),
                        source,
                    })?;
                }
                Ok(Resolution::Skipped(SkipReason::CloneFailed(
                    module.to_string(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ProjectRef, StaticIndex};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;

    struct ScriptedPrompter {
        answer: bool,
        asked: Cell<bool>,
    }

    impl ScriptedPrompter {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: Cell::new(false),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&self, _question: &str) -> bool {
            self.asked.set(true);
            self.answer
        }
    }

    struct ScriptedVcs {
        behind: bool,
        clone_fails: bool,
        clone_leaves_partial: bool,
    }

    impl Vcs for ScriptedVcs {
        fn clone_repo(
            &self,
            url: &str,
            parent: &Path,
            _branch: Option<&str>,
            target: Option<&str>,
        ) -> Result<(), GitError> {
            let dir = parent.join(target.unwrap());
            if self.clone_fails {
                if self.clone_leaves_partial {
                    fs::create_dir_all(&dir).unwrap();
                }
                return Err(GitError::CloneFailed {
                    url: url.to_string(),
                    stderr: "remote hung up".to_string(),
                });
            }
            fs::create_dir_all(&dir).unwrap();
            Ok(())
        }

        fn local_head(&self, _dir: &Path) -> Result<String, GitError> {
            Ok("0".repeat(40))
        }

        fn remote_update(&self, _dir: &Path) -> Result<(), GitError> {
            Ok(())
        }

        fn behind_remote(&self, _dir: &Path) -> Result<bool, GitError> {
            Ok(self.behind)
        }
    }

    fn config_in(dir: &Path) -> LaneConfig {
        let mut config = LaneConfig::default();
        config.build_root = dir.join("build");
        config
    }

    fn index_with(module: &str) -> StaticIndex {
        StaticIndex::new(vec![ProjectRef {
            name: module.to_string(),
            git_url: format!("https://pkgs.test/rpms/{module}.git"),
        }])
    }

    #[test]
    fn test_ensure_clones_missing_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let vcs = ScriptedVcs {
            behind: false,
            clone_fails: false,
            clone_leaves_partial: false,
        };
        let index = index_with("bash");
        let prompter = ScriptedPrompter::new(false);

        let manager = WorkspaceManager::new(&config, &vcs, &index, &prompter);
        match manager.ensure("bash").unwrap() {
            Resolution::Ready(ws) => assert!(ws.module_dir().is_dir()),
            other => panic!("expected ready, got {other:?}"),
        }
        assert!(!prompter.asked.get());
    }

    #[test]
    fn test_unknown_package_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let vcs = ScriptedVcs {
            behind: false,
            clone_fails: false,
            clone_leaves_partial: false,
        };
        let index = StaticIndex::default();
        let prompter = ScriptedPrompter::new(true);

        let manager = WorkspaceManager::new(&config, &vcs, &index, &prompter);
        match manager.ensure("bash").unwrap() {
            Resolution::Skipped(SkipReason::UnknownPackage(m)) => assert_eq!(m, "bash"),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_divergence_default_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(config.module_dir("bash")).unwrap();
        let vcs = ScriptedVcs {
            behind: true,
            clone_fails: false,
            clone_leaves_partial: false,
        };
        let index = index_with("bash");

        let decline = ScriptedPrompter::new(false);
        let manager = WorkspaceManager::new(&config, &vcs, &index, &decline);
        match manager.ensure("bash").unwrap() {
            Resolution::Skipped(SkipReason::DivergenceAborted(_)) => {}
            other => panic!("expected abort, got {other:?}"),
        }
        assert!(decline.asked.get());

        let accept = ScriptedPrompter::new(true);
        let manager = WorkspaceManager::new(&config, &vcs, &index, &accept);
        assert!(matches!(
            manager.ensure("bash").unwrap(),
            Resolution::Ready(_)
        ));
    }

    #[test]
    fn test_clone_failure_removes_partial_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let vcs = ScriptedVcs {
            behind: false,
            clone_fails: true,
            clone_leaves_partial: true,
        };
        let index = index_with("bash");
        let prompter = ScriptedPrompter::new(false);

        let manager = WorkspaceManager::new(&config, &vcs, &index, &prompter);
        match manager.ensure("bash").unwrap() {
            Resolution::Skipped(SkipReason::CloneFailed(_)) => {}
            other => panic!("expected clone failure skip, got {other:?}"),
        }
        assert!(!config.module_dir("bash").exists());
    }
}
