//! Command handlers
//!
//! Every subcommand returns a [`CommandOutcome`] or a [`CommandError`] to
//! the dispatcher in `main`; nothing below this layer decides the process
//! exit code. "Nothing to do" conditions are successes with a message.

pub mod build;
pub mod clone;
pub mod container;
pub mod mockbuild;
pub mod new_sources;
pub mod search;

use crate::config::{ConfigError, LaneConfig};
use crate::git::{GitCli, GitError, Vcs};
use crate::hub::client::HttpHub;
use crate::hub::target::TargetError;
use crate::hub::{BuildHub, TaskId};
use crate::index::{HttpIndex, IndexError, PackageIndex};
use crate::sources::{Fetcher, HttpFetcher, SourceError};
use crate::spec::SpecError;
use crate::srpm::SrpmError;
use crate::submit::SubmitError;
use crate::upload::{UploadError, Uploader};
use crate::workspace::{
    Prompter, Resolution, StdinPrompter, Workspace, WorkspaceError, WorkspaceManager,
};

/// How a command ended, short of an error
#[derive(Debug)]
pub enum CommandOutcome {
    Done,
    /// A clean stop with nothing performed; exits 0 after printing the reason
    NothingToDo(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Srpm(#[from] SrpmError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Build task {task} did not complete successfully")]
    TaskFailed { task: TaskId },

    #[error("Cannot determine the package from the current directory")]
    NoModule,
}

// Exit code classes: 2 usage, 10 remote state, 30 integrity,
// 40 tool invocation, 1 everything else.
impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Config(_) | CommandError::NoModule => 2,
            CommandError::Submit(err) => match err {
                SubmitError::ArchOverrideNotScratch | SubmitError::BadArchToken(_) => 2,
                SubmitError::Target(_) | SubmitError::Hub(_) | SubmitError::ContainerUnsupported => {
                    10
                }
                SubmitError::Git(_) => 40,
                SubmitError::NvrUnavailable { .. } => 1,
            },
            CommandError::Index(_) => 10,
            CommandError::Source(SourceError::Checksum(_))
            | CommandError::Upload(UploadError::Checksum(_)) => 30,
            CommandError::Source(SourceError::Process(_))
            | CommandError::Spec(SpecError::QueryTool(_))
            | CommandError::Srpm(SrpmError::Process(_))
            | CommandError::Upload(UploadError::Process(_))
            | CommandError::Git(_)
            | CommandError::Workspace(WorkspaceError::Git(_)) => 40,
            CommandError::Workspace(WorkspaceError::Index(_)) => 10,
            _ => 1,
        }
    }
}

impl From<TargetError> for CommandError {
    fn from(err: TargetError) -> Self {
        CommandError::Submit(SubmitError::Target(err))
    }
}

/// Shared dependencies of every command, constructed once in `main`
pub struct CommandContext {
    pub config: LaneConfig,
    pub hub: Box<dyn BuildHub>,
    pub container_hub: Option<Box<dyn BuildHub>>,
    pub vcs: Box<dyn Vcs>,
    pub index: Box<dyn PackageIndex>,
    pub prompter: Box<dyn Prompter>,
    pub fetcher: Box<dyn Fetcher>,
    pub uploader: Uploader,
}

impl CommandContext {
    pub fn from_config(config: LaneConfig) -> Self {
        let hub: Box<dyn BuildHub> = Box::new(HttpHub::new(config.hub.clone()));
        let container_hub = config
            .container_hub
            .clone()
            .map(|session| Box::new(HttpHub::new(session)) as Box<dyn BuildHub>);
        let index = Box::new(HttpIndex::new(config.index_url.clone()));
        Self {
            config,
            hub,
            container_hub,
            vcs: Box::new(GitCli),
            index,
            prompter: Box::new(StdinPrompter),
            fetcher: Box::new(HttpFetcher::default()),
            uploader: Uploader::default(),
        }
    }

    /// Resolve the checkout for `module`, or stop cleanly
    pub fn ensure_workspace(
        &self,
        module: &str,
    ) -> Result<Result<Workspace, CommandOutcome>, CommandError> {
        let manager = WorkspaceManager::new(
            &self.config,
            self.vcs.as_ref(),
            self.index.as_ref(),
            self.prompter.as_ref(),
        );
        match manager.ensure(module)? {
            Resolution::Ready(workspace) => Ok(Ok(workspace)),
            Resolution::Skipped(reason) => {
                Ok(Err(CommandOutcome::NothingToDo(reason.to_string())))
            }
        }
    }
}

/// Package name taken from the invocation directory
pub fn module_from_cwd() -> Result<String, CommandError> {
    let cwd = std::env::current_dir().map_err(|_| CommandError::NoModule)?;
    cwd.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or(CommandError::NoModule)
}
