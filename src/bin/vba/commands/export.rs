use anyhow::Result;

use vba_blocks::ops::{export, ExportOptions};
use vba_blocks::GlobalContext;

use crate::cli::ExportArgs;

pub fn execute(ctx: &GlobalContext, args: ExportArgs) -> Result<()> {
    export(
        ctx,
        &ExportOptions {
            target: args.target,
            completed: args.completed,
            addin: args.addin,
        },
    )
}
