use anyhow::Result;

use vba_blocks::ops::{run_script, RunOptions};
use vba_blocks::GlobalContext;

use crate::cli::RunArgs;

pub fn execute(ctx: &GlobalContext, args: RunArgs) -> Result<()> {
    run_script(
        ctx,
        &RunOptions {
            script: args.script,
            args: args.args,
        },
    )
}
