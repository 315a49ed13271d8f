//! The `clone` command
//!
//! Fetches the upstream source of a package into the invocation directory:
//! lookaside artifacts when the checkout tracks a manifest, otherwise a git
//! clone of the spec's `URL:` when it looks cloneable.

use std::path::Path;

use tracing::info;

use super::{CommandContext, CommandError, CommandOutcome};
use crate::sources::{fetch_entry, load_manifest};
use crate::spec::{locate_spec, ModuleMetadata};

pub fn run(
    ctx: &CommandContext,
    module: &str,
    branch: Option<&str>,
    dest_parent: &Path,
) -> Result<CommandOutcome, CommandError> {
    let dest = dest_parent.join(module);
    if dest.exists() {
        return Ok(CommandOutcome::NothingToDo(format!(
            "{} already exists, not overwriting",
            dest.display()
        )));
    }

    let workspace = match ctx.ensure_workspace(module)? {
        Ok(workspace) => workspace,
        Err(outcome) => return Ok(outcome),
    };
    let module_dir = workspace.module_dir();

    if let Some(entries) = load_manifest(&module_dir)? {
        std::fs::create_dir_all(&dest).map_err(|source| {
            CommandError::Source(crate::sources::SourceError::Io {
                path: dest.clone(),
                source,
            })
        })?;
        for entry in &entries {
            fetch_entry(&ctx.config, module, entry, &dest, ctx.fetcher.as_ref())?;
        }
        info!(module, count = entries.len(), "sources cloned from lookaside");
        return Ok(CommandOutcome::Done);
    }

    let spec = locate_spec(&module_dir, module)?;
    let metadata = ModuleMetadata::new(spec, ctx.config.dist.clone());
    let url = metadata.upstream_url()?;

    if url.ends_with(".git") || url.contains(&ctx.config.review_host_infix) {
        ctx.vcs.clone_repo(&url, dest_parent, branch, Some(module))?;
        info!(module, url = %url, "upstream repository cloned");
        Ok(CommandOutcome::Done)
    } else {
        Ok(CommandOutcome::NothingToDo(format!(
            "No viable cloning method for {module}: {url} is neither a git URL nor on the review host"
        )))
    }
}
