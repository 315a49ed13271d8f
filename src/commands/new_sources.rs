//! The `new-sources` command

use std::path::PathBuf;

use super::{CommandContext, CommandError, CommandOutcome};
use crate::upload::UploadOutcome;

pub fn run(
    ctx: &CommandContext,
    module: &str,
    files: &[PathBuf],
) -> Result<CommandOutcome, CommandError> {
    let workspace = match ctx.ensure_workspace(module)? {
        Ok(workspace) => workspace,
        Err(outcome) => return Ok(outcome),
    };

    match ctx
        .uploader
        .new_sources(&ctx.config, module, &workspace.module_dir(), files)?
    {
        UploadOutcome::Done => Ok(CommandOutcome::Done),
        UploadOutcome::WorkDirBusy(path) => Ok(CommandOutcome::NothingToDo(format!(
            "Work directory {} already exists; remove it and retry",
            path.display()
        ))),
    }
}
