//! Echolink CLI entry point

use clap::Parser;
use tracing::{error, info};

use echolink_cli::{
    app::EchoApp,
    cli::{Cli, Commands},
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = load_configuration(&cli)?;
    config.apply_overrides(&cli);
    config.validate()?;

    // Initialize logging
    setup_logging(config.cli.verbose);

    let result = match &cli.command {
        Commands::Config => {
            print!("{}", AppConfig::example_config()?);
            return Ok(());
        }
        Commands::Chat => match EchoApp::start(config).await {
            Ok(app) => app.chat().await,
            Err(e) => Err(e),
        },
        Commands::Send { message } => match EchoApp::start(config).await {
            Ok(app) => app.send_once(message).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Echolink exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(config_path) => AppConfig::load_from_file(config_path),
        None => Ok(AppConfig::default()),
    }
}
