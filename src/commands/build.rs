//! The `build` command

use super::{CommandContext, CommandError, CommandOutcome};
use crate::spec::{locate_spec, ModuleMetadata};
use crate::submit::{submit_build, BuildParams};

/// Resolve the workspace for `module` and submit a build
pub fn run(
    ctx: &CommandContext,
    module: &str,
    params: &BuildParams,
) -> Result<CommandOutcome, CommandError> {
    let workspace = match ctx.ensure_workspace(module)? {
        Ok(workspace) => workspace,
        Err(outcome) => return Ok(outcome),
    };

    // An SRPM submission never touches the spec file.
    let metadata = if params.srpm_url.is_some() {
        None
    } else {
        let spec = locate_spec(&workspace.module_dir(), module)?;
        Some(ModuleMetadata::new(spec, ctx.config.dist.clone()))
    };

    let outcome = submit_build(
        ctx.hub.as_ref(),
        &ctx.config,
        &workspace,
        metadata.as_ref(),
        ctx.vcs.as_ref(),
        params,
    )?;

    match outcome.watched {
        Some(rv) if rv != 0 => Err(CommandError::TaskFailed { task: outcome.task }),
        _ => Ok(CommandOutcome::Done),
    }
}
