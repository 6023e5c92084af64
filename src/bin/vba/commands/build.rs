use anyhow::Result;

use vba_blocks::ops::{build, BuildOptions};
use vba_blocks::GlobalContext;

use crate::cli::BuildArgs;

pub fn execute(ctx: &GlobalContext, args: BuildArgs) -> Result<()> {
    build(
        ctx,
        &BuildOptions {
            target: args.target,
            release: args.release,
            open: args.open,
            addin: args.addin,
        },
    )
}
