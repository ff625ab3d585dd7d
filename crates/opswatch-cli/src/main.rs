//! Opswatch CLI binary entrypoint.
//!
//! This is the main entry point for the `opswatch` command-line tool.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use opswatch_cli::cli::{Cli, Commands};
use opswatch_cli::commands::{
    AlertCommand, ServiceCommand, SettingsCommand, StatusCommand, UserCommand,
};
use opswatch_cli::output::OutputFormat;
use opswatch_cli::CliError;
use opswatch_client::{CacheConfig, ClientConfig, HttpRepository, SyncCache};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_cache(cli: &Cli) -> Result<SyncCache<HttpRepository>, CliError> {
    if cli.poll_interval == 0 {
        return Err(CliError::InvalidArgument(
            "--poll-interval must be at least 1 second".into(),
        ));
    }

    let mut client_config = ClientConfig::new(&cli.api_url);
    if let Some(secs) = cli.timeout {
        client_config = client_config.with_request_timeout(Duration::from_secs(secs));
    }
    let repo = HttpRepository::new(&client_config)?;

    let cache_config =
        CacheConfig::default().with_services_poll_interval(Duration::from_secs(cli.poll_interval));
    Ok(SyncCache::with_config(repo, cache_config))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let format = OutputFormat::new(cli.format);
    let cache = build_cache(&cli)?;
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Status => {
            let cmd = StatusCommand::new(&cache);
            cmd.execute(&mut stdout, &format).await?;
        }
        Commands::Services { command } => {
            let cmd = ServiceCommand::new(&cache);
            cmd.execute(&mut stdout, &format, command).await?;
        }
        Commands::Alerts { command } => {
            let cmd = AlertCommand::new(&cache);
            cmd.execute(&mut stdout, &format, command).await?;
        }
        Commands::Users { command } => {
            let cmd = UserCommand::new(&cache);
            cmd.execute(&mut stdout, &format, command).await?;
        }
        Commands::Settings { command } => {
            let cmd = SettingsCommand::new(&cache);
            cmd.execute(&mut stdout, &format, command).await?;
        }
    }

    Ok(())
}
