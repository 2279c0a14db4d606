mod cli;
mod commands;
mod context;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use error::exit_with_error;

fn init_tracing(cli: &Cli) {
    // Tables and JSON go to stdout and logs go to stderr. Logging is off
    // unless --verbose is given (info, or RUST_LOG when set), so `--json`
    // output piped into another tool never picks up log lines.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::new("off")
    };

    let ansi = !(cli.no_color || std::env::var_os("NO_COLOR").is_some());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    init_tracing(&cli);

    if let Err(e) = run(cli) {
        exit_with_error(e);
    }
}

fn run(cli: Cli) -> error::CliResult<()> {
    let ctx = context::build_index(&cli.config, &cli.index)?;
    let particle_type = cli.index.particle_type;

    match cli.command {
        Commands::Trunk { root } => {
            commands::trunk::run(&ctx, context::group_identity(&root), particle_type, cli.json)
        }

        Commands::Tree { root, leaves } => commands::tree::run(
            &ctx,
            context::group_identity(&root),
            leaves,
            particle_type,
            cli.json,
        ),

        Commands::Summary { roots } => commands::summary::run(&ctx, roots, cli.json),
    }
}
