use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use learnsync::cli::args::Cli;
use learnsync::cli::commands;
use learnsync::config::Config;
use learnsync::error::LearnsyncError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        let code = e
            .downcast_ref::<LearnsyncError>()
            .map_or(1, LearnsyncError::exit_code);
        std::process::exit(code);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "learnsync=warn",
        1 => "learnsync=info",
        _ => "learnsync=debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let output = commands::execute(cli, config).await?;

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
