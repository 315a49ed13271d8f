//! The `search` command

use super::{CommandContext, CommandError, CommandOutcome};

pub fn run(ctx: &CommandContext, word: &str) -> Result<CommandOutcome, CommandError> {
    let hits = ctx.index.search(word)?;
    if hits.is_empty() {
        return Ok(CommandOutcome::NothingToDo(format!(
            "No packages matching {word:?}"
        )));
    }
    for project in hits {
        println!("{}", project.name);
    }
    Ok(CommandOutcome::Done)
}
