//! High-level actions wiring the pipeline together.

pub mod build;
pub mod export;
pub mod lockfile;
pub mod new;
pub mod patch;
pub mod resolve;
pub mod run;
pub mod target_add;

pub use build::{build, BuildOptions};
pub use export::{export, ExportOptions};
pub use new::{new_project, NewOptions};
pub use run::{run_script, RunOptions};
pub use target_add::{target_add, TargetAddOptions};
