//! The `mockbuild` command
//!
//! Reconciles sources, builds an SRPM, and rebuilds it in mock.

use super::{CommandContext, CommandError, CommandOutcome};
use crate::sources::{ensure_sources, load_manifest};
use crate::spec::{locate_spec, ModuleMetadata};
use crate::srpm::{build_srpm, mockbuild, MockOptions};

pub fn run(
    ctx: &CommandContext,
    module: &str,
    options: &MockOptions,
) -> Result<CommandOutcome, CommandError> {
    let workspace = match ctx.ensure_workspace(module)? {
        Ok(workspace) => workspace,
        Err(outcome) => return Ok(outcome),
    };
    let module_dir = workspace.module_dir();

    let spec = locate_spec(&module_dir, module)?;
    let metadata = ModuleMetadata::new(spec, ctx.config.dist.clone());
    ensure_sources(
        &ctx.config,
        module,
        &module_dir,
        &metadata,
        ctx.fetcher.as_ref(),
    )?;

    let manifest_hashtype = load_manifest(&module_dir)?
        .and_then(|entries| entries.first().map(|e| e.hashtype));
    let srpm = build_srpm(&ctx.config, &module_dir, &metadata, manifest_hashtype)?;
    mockbuild(&ctx.config, &module_dir, &metadata, &srpm, options)?;
    Ok(CommandOutcome::Done)
}
