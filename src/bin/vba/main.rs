//! vba-blocks CLI.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(vba_blocks::core::errors::exit_code(&e));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // `DEBUG=vba-blocks:*` is honoured as an alias for the tracing filter.
    let filter = if cli.verbose {
        EnvFilter::new("vba_blocks=debug")
    } else if std::env::var("DEBUG")
        .map(|v| v.starts_with("vba-blocks"))
        .unwrap_or(false)
    {
        EnvFilter::new("vba_blocks=trace")
    } else {
        EnvFilter::new("vba_blocks=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let ctx = vba_blocks::GlobalContext::new()?
        .with_reporter(vba_blocks::util::Reporter::new(cli.quiet));

    match cli.command {
        Commands::Build(args) => commands::build::execute(&ctx, args),
        Commands::Export(args) => commands::export::execute(&ctx, args),
        Commands::Target(args) => commands::target::execute(&ctx, args),
        Commands::Run(args) => commands::run::execute(&ctx, args),
        Commands::New(args) => commands::new::execute(&ctx, args),
    }
}
