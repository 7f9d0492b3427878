// ABOUTME: Entry point for the shipwright CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, EnvCommands};
use shipwright::config::{self, Config};
use shipwright::error::{Error, Result};
use shipwright::output::Output;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output_mode());
    if let Err(e) = run(cli, &mut output).await {
        // Failed releases were already summarised.
        if !matches!(e, Error::ReleaseFailed { .. }) {
            output.error(&e.to_string());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let cwd = env::current_dir()?;
    let verbose = cli.verbose;
    match cli.command {
        Commands::Init { project, force } => {
            config::init_config(&cwd, project.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Env(EnvCommands::Create { name, gcp, aws }) => {
            let config = Config::discover(&cwd)?;
            commands::create_environment(&config, name, gcp, aws, output).await
        }
        Commands::Deploy {
            environment,
            yes,
            services,
        } => {
            let config = Config::discover(&cwd)?;
            let definitions = config.select_services(&services)?;
            commands::deploy(&config, &definitions, &environment, yes, verbose, output).await
        }
        Commands::Promote {
            from,
            to,
            yes,
            services,
        } => {
            let config = Config::discover(&cwd)?;
            let definitions = config.select_services(&services)?;
            commands::promote(&config, &definitions, &from, &to, yes, verbose, output).await
        }
        Commands::Status { environment } => {
            let config = Config::discover(&cwd)?;
            commands::status(&config, &environment, output).await
        }
    }
}
