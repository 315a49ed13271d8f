//! The `container-build` command

use super::{CommandContext, CommandError, CommandOutcome};
use crate::submit::{submit_container, ContainerParams};

pub fn run(
    ctx: &mut CommandContext,
    module: &str,
    params: &ContainerParams,
) -> Result<CommandOutcome, CommandError> {
    let workspace = match ctx.ensure_workspace(module)? {
        Ok(workspace) => workspace,
        Err(outcome) => return Ok(outcome),
    };

    let container_hub = ctx.container_hub.take();
    let outcome = submit_container(
        &mut ctx.hub,
        container_hub,
        &ctx.config,
        &workspace,
        ctx.vcs.as_ref(),
        params,
    )?;

    match outcome.watched {
        Some(rv) if rv != 0 => Err(CommandError::TaskFailed { task: outcome.task }),
        _ => Ok(CommandOutcome::Done),
    }
}
