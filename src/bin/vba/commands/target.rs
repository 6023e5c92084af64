use anyhow::Result;

use vba_blocks::ops::{target_add, TargetAddOptions};
use vba_blocks::GlobalContext;

use crate::cli::{TargetArgs, TargetCommands};

pub fn execute(ctx: &GlobalContext, args: TargetArgs) -> Result<()> {
    match args.command {
        TargetCommands::Add(add) => target_add(
            ctx,
            &TargetAddOptions {
                kind: add.kind,
                from: add.from,
                name: add.name,
                path: add.path,
                addin: add.addin,
            },
        ),
    }
}
