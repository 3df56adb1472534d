//! qmail CLI entry point

use clap::Parser;
use qmail_cli::{Cli, CliOverrides, Config, ExitCode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Create default config on first run
    if cli.config.is_none() {
        if let Err(e) = Config::create_default_if_missing() {
            eprintln!("Warning: Could not create default config: {e}");
        }
    }

    let config = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Config error: {e}");
            return ExitCode::InvalidInput.to_exit_code();
        }
    };

    let overrides = CliOverrides {
        debug: if cli.debug { Some(true) } else { None },
        server_url: cli.server.clone(),
        keystore_path: cli.keystore.clone(),
    };
    let config = config.with_overrides(&overrides);

    // Initialize logging based on config (with CLI override)
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_env("QMAIL_LOG")
            .or_else(|_| EnvFilter::try_new(&config.logging.level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.execute_with_config(config).await {
        Ok(code) => code.to_exit_code(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::GeneralError.to_exit_code()
        }
    }
}
