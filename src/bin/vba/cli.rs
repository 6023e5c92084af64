//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// vba-blocks - a package manager and build tool for VBA
#[derive(Parser)]
#[command(name = "vba")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build targets from the project's components and dependencies
    Build(BuildArgs),

    /// Export a target's components back into the project
    Export(ExportArgs),

    /// Manage build targets
    Target(TargetArgs),

    /// Run a project automation script
    Run(RunArgs),

    /// Create a new vba-blocks project
    New(NewArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build only the matching target (type or name)
    #[arg(long)]
    pub target: Option<String>,

    /// Rebuild targets from blank instead of patching in place
    #[arg(long)]
    pub release: bool,

    /// Leave the built document open in the host application
    #[arg(long)]
    pub open: bool,

    /// Path to the addin bridge script
    #[arg(long)]
    pub addin: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Export the matching target (type or name)
    #[arg(long)]
    pub target: Option<String>,

    /// Re-fold an already-exported directory instead of driving the host
    #[arg(long)]
    pub completed: Option<PathBuf>,

    /// Path to the addin bridge script
    #[arg(long)]
    pub addin: Option<PathBuf>,
}

#[derive(Args)]
pub struct TargetArgs {
    #[command(subcommand)]
    pub command: TargetCommands,
}

#[derive(Subcommand)]
pub enum TargetCommands {
    /// Add a target to the project and build it
    Add(TargetAddArgs),
}

#[derive(Args)]
pub struct TargetAddArgs {
    /// Target type (xlsm, xlam)
    pub kind: Option<String>,

    /// Seed the target from an existing document
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Target name (defaults to the package name)
    #[arg(long)]
    pub name: Option<String>,

    /// Output directory (defaults to `build`)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Path to the addin bridge script
    #[arg(long)]
    pub addin: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Script name under `scripts/`, or a path
    pub script: String,

    /// Arguments passed through to the script
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct NewArgs {
    /// Project name (lowercase kebab-case)
    pub name: String,

    /// Target type for the new project (default xlsm)
    #[arg(long)]
    pub target: Option<String>,
}
