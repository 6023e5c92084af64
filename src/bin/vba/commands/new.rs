use anyhow::Result;

use vba_blocks::ops::{new_project, NewOptions};
use vba_blocks::GlobalContext;

use crate::cli::NewArgs;

pub fn execute(ctx: &GlobalContext, args: NewArgs) -> Result<()> {
    new_project(
        ctx,
        &NewOptions {
            name: args.name,
            target: args.target,
        },
    )
}
