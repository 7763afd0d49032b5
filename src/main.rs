use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "mirrorselect",
    version,
    about = "Geo-aware package mirror selection with health monitoring",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "mirrorselect.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and the mirror monitor
    Serve,

    /// Probe every mirror once and print the results
    Check {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the location of an IP address and the mirrors it would get
    Locate {
        /// Client IP address
        ip: IpAddr,

        /// Package ABI used to render example URLs
        #[arg(long)]
        abi: Option<String>,
    },

    /// Validate the configuration and mirror list
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config decides the default log format; a broken config is
    // reported after tracing is up.
    let config = commands::load_config(&cli.config);
    let format = cli
        .log_format
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.logging.format.clone()))
        .unwrap_or_else(|| "text".to_string());
    let level = config
        .as_ref()
        .ok()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());

    setup_tracing(&format, &level, cli.verbose)?;

    let config = config?;

    match cli.command {
        Commands::Serve => {
            tracing::info!(config = %cli.config.display(), "Starting serve command");
            commands::serve(config).await?;
        }

        Commands::Check { json } => {
            tracing::info!(config = %cli.config.display(), "Starting check command");
            commands::check(config, json).await?;
        }

        Commands::Locate { ip, abi } => {
            tracing::info!(ip = %ip, "Starting locate command");
            commands::locate(config, ip, abi).await?;
        }

        Commands::Validate => {
            commands::validate(config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("mirrorselect=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("mirrorselect={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
