//! Build submission
//!
//! Turns a resolved workspace into hub submissions: regular builds, chain
//! builds, and container builds. The source reference is always explicit,
//! either `git+<repo>?#<commit>` or an SRPM URL; the hub never guesses.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::info;

use crate::config::LaneConfig;
use crate::git::{GitError, Vcs};
use crate::hub::target::{resolve_target, TargetError};
use crate::hub::{BuildHub, BuildOptions, ContainerOptions, HubError, HubSwap, TaskId, WATCH_OK};
use crate::spec::ModuleMetadata;
use crate::workspace::Workspace;

/// Background submissions run at this fixed low priority
pub const BACKGROUND_PRIORITY: i64 = 5;

static ARCH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[0-9a-zA-Z_.]+$").expect("arch token pattern"));

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("--arch-override requires a scratch build")]
    ArchOverrideNotScratch,

    #[error("Invalid architecture name: {0:?}")]
    BadArchToken(String),

    #[error("Could not determine the package NVR ({reason}); pass --skip-nvr-check to submit anyway")]
    NvrUnavailable { reason: String },

    #[error("The build hub does not support container builds")]
    ContainerUnsupported,

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Everything a build submission needs beyond the workspace itself
#[derive(Debug, Clone, Default)]
pub struct BuildParams {
    pub target: Option<String>,
    pub scratch: bool,
    pub background: bool,
    pub skip_tag: bool,
    pub skip_nvr_check: bool,
    pub nowait: bool,
    pub arches: Vec<String>,
    /// Submit this SRPM URL instead of a git reference
    pub srpm_url: Option<String>,
    /// Explicit commit hash; defaults to the local HEAD
    pub commit: Option<String>,
    /// Earlier chain links; the current package becomes the final link
    pub chain: Vec<String>,
    /// Merge chain links into one set instead of one set per link
    pub sets: bool,
}

#[derive(Debug, Clone)]
pub struct ContainerParams {
    pub target: Option<String>,
    pub scratch: bool,
    pub repo_urls: Vec<String>,
    pub branch: Option<String>,
    pub nowait: bool,
}

/// A submitted (and possibly watched) task
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub task: TaskId,
    /// Exit disposition when the task was watched to completion
    pub watched: Option<i32>,
}

fn validate_arches(params: &BuildParams) -> Result<Option<String>, SubmitError> {
    if params.arches.is_empty() {
        return Ok(None);
    }
    if !params.scratch {
        return Err(SubmitError::ArchOverrideNotScratch);
    }
    for arch in &params.arches {
        if !ARCH_TOKEN.is_match(arch) {
            return Err(SubmitError::BadArchToken(arch.clone()));
        }
    }
    Ok(Some(params.arches.join(" ")))
}

/// Group the chain links into build sets
///
/// Every earlier link is its own set. The current package's source joins
/// the last set when `sets` is on, otherwise it becomes a final singleton
/// set.
fn chain_sets(links: &[String], sets: bool, final_link: String) -> Vec<Vec<String>> {
    let mut chain: Vec<Vec<String>> = links.iter().map(|link| vec![link.clone()]).collect();
    match chain.last_mut() {
        Some(last) if sets => last.push(final_link),
        _ => chain.push(vec![final_link]),
    }
    chain
}

fn git_source(config: &LaneConfig, module: &str, commit: &str) -> String {
    format!("git+{}?#{}", config.spec_repo_url(module), commit)
}

fn log_task(hub: &dyn BuildHub, reference: &str, task: TaskId) {
    info!(
        task,
        reference,
        url = format!("{}/taskinfo?taskID={}", hub.web_url(), task),
        "build task created"
    );
}

/// Submit a regular or chain build for the workspace
pub fn submit_build(
    hub: &dyn BuildHub,
    config: &LaneConfig,
    workspace: &Workspace,
    metadata: Option<&ModuleMetadata>,
    vcs: &dyn Vcs,
    params: &BuildParams,
) -> Result<SubmitOutcome, SubmitError> {
    let arch_override = validate_arches(params)?;
    let target_name = params.target.clone().unwrap_or_else(|| config.target.clone());
    let chained = !params.chain.is_empty();
    let resolved = resolve_target(hub, &target_name, params.scratch, chained)?;
    let priority = params.background.then_some(BACKGROUND_PRIORITY);

    // An SRPM source names itself; a git source is gated on a readable NVR
    // unless the check is explicitly bypassed.
    let (source, reference) = match params.srpm_url {
        Some(ref srpm) => {
            let basename = srpm.rsplit('/').next().unwrap_or(srpm);
            (srpm.clone(), basename.to_string())
        }
        None => {
            let commit = match params.commit {
                Some(ref commit) => commit.clone(),
                None => vcs.local_head(&workspace.module_dir())?,
            };
            let reference = if params.skip_nvr_check {
                workspace.module.clone()
            } else {
                let metadata = metadata.ok_or_else(|| SubmitError::NvrUnavailable {
                    reason: "no spec file metadata".to_string(),
                })?;
                metadata
                    .identity()
                    .map_err(|source| SubmitError::NvrUnavailable {
                        reason: source.to_string(),
                    })?
                    .nvr()
            };
            (git_source(config, &workspace.module, &commit), reference)
        }
    };

    let task = if chained {
        let chain = chain_sets(&params.chain, params.sets, source);
        hub.submit_chain_build(&chain, &resolved.target.name, priority)?
    } else {
        let options = BuildOptions {
            skip_tag: params.skip_tag,
            scratch: params.scratch,
            arch_override,
        };
        hub.submit_build(&source, &resolved.target.name, &options, priority)?
    };
    log_task(hub, &reference, task);

    let watched = if params.nowait {
        None
    } else {
        Some(hub.watch_task(task)?)
    };
    Ok(SubmitOutcome { task, watched })
}

/// Container build target derived from a package target name
pub fn container_target(base: &str) -> String {
    let base = base.strip_suffix("-candidate").unwrap_or(base);
    format!("{base}-docker-candidate")
}

/// Submit a container build, against the container hub session when one is
/// configured
///
/// The container hub is swapped in for the duration of the submission and
/// the original session is restored on every exit path.
pub fn submit_container(
    slot: &mut Box<dyn BuildHub>,
    container_hub: Option<Box<dyn BuildHub>>,
    config: &LaneConfig,
    workspace: &Workspace,
    vcs: &dyn Vcs,
    params: &ContainerParams,
) -> Result<SubmitOutcome, SubmitError> {
    let swap_guard;
    let hub: &dyn BuildHub = match container_hub {
        Some(replacement) => {
            swap_guard = HubSwap::new(slot, replacement);
            swap_guard.hub()
        }
        None => slot.as_ref(),
    };

    if !hub.supports_container_builds()? {
        return Err(SubmitError::ContainerUnsupported);
    }

    let base = params.target.clone().unwrap_or_else(|| config.target.clone());
    let target_name = container_target(&base);
    let resolved = resolve_target(hub, &target_name, params.scratch, false)?;

    let commit = vcs.local_head(&workspace.module_dir())?;
    let source = git_source(config, &workspace.module, &commit);
    let options = ContainerOptions {
        scratch: params.scratch,
        yum_repourls: params.repo_urls.clone(),
        git_branch: params.branch.clone(),
    };

    let task = hub.submit_container_build(&source, &resolved.target.name, &options, None)?;
    log_task(hub, &workspace.module, task);

    let watched = if params.nowait {
        None
    } else {
        let rv = hub.watch_task(task)?;
        if rv == WATCH_OK {
            for build in hub.task_result(task)?.builds {
                info!(
                    build,
                    url = format!("{}/buildinfo?buildID={}", hub.web_url(), build),
                    "container build created"
                );
            }
        }
        Some(rv)
    };
    Ok(SubmitOutcome { task, watched })
}
