//! WVA CLI - Command-line tool for WVA telematics devices
//!
//! Raw web services access, vehicle data, subscriptions and the event stream.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wva_client::{ClientConfig, Wva, WvaClient};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "wva-cli")]
#[command(author, version, about = "WVA Telematics Device CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Device hostname or IP address (optionally host:port)
    #[arg(long, env = "WVA_HOSTNAME")]
    hostname: Option<String>,

    /// Web services username
    #[arg(short, long, env = "WVA_USERNAME")]
    username: Option<String>,

    /// Web services password
    #[arg(short, long, env = "WVA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use plain HTTP instead of HTTPS
    #[arg(long)]
    http: bool,

    /// Configuration file path
    #[arg(short, long, env = "WVA_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a web services path (e.g. vehicle/data)
    Get {
        /// Path relative to /ws/
        path: String,
    },

    /// DELETE a web services path
    Delete {
        /// Path relative to /ws/
        path: String,
    },

    /// PUT a file's contents to a web services path
    Put {
        /// Path relative to /ws/
        path: String,

        /// File holding the request body
        file: PathBuf,
    },

    /// POST a file's contents to a web services path
    Post {
        /// Path relative to /ws/
        path: String,

        /// File holding the request body
        file: PathBuf,
    },

    /// Read the current value of a vehicle data element
    Sample {
        /// Element name (e.g. VehicleSpeed)
        name: String,
    },

    /// List subscriptions
    Subscriptions,

    /// Subscribe to a data URI
    Subscribe {
        /// Subscription name (e.g. speed~sub)
        short_name: String,

        /// Data URI (e.g. vehicle/data/VehicleSpeed)
        uri: String,

        /// Seconds between samples
        #[arg(long, default_value_t = wva_client::subscription::DEFAULT_INTERVAL)]
        interval: u32,

        /// Buffering policy: queue or discard
        #[arg(long, default_value = wva_client::subscription::DEFAULT_BUFFER)]
        buffer: String,
    },

    /// Delete a subscription
    Unsubscribe {
        /// Subscription name
        short_name: String,
    },

    /// Print event stream data until Ctrl+C
    Stream,

    /// Save hostname and credentials to the config file
    Configure,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        if config_path.exists() {
            Config::load_from(config_path)?
        } else {
            Config::default()
        }
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args (and env) with config
    let merged = config.merge_with_args(
        cli.hostname.as_deref(),
        cli.username.as_deref(),
        cli.password.as_deref(),
        cli.http,
    );

    // Create output context
    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);

    run(&cli, &merged, &ctx).await
}

async fn run(cli: &Cli, merged: &MergedConfig, ctx: &OutputContext) -> Result<()> {
    match &cli.command {
        Commands::Get { path } => {
            let client = create_client(merged)?;
            commands::get(&client, path, ctx).await?;
        }

        Commands::Delete { path } => {
            let client = create_client(merged)?;
            commands::delete(&client, path, ctx).await?;
        }

        Commands::Put { path, file } => {
            let client = create_client(merged)?;
            commands::put(&client, path, file, ctx).await?;
        }

        Commands::Post { path, file } => {
            let client = create_client(merged)?;
            commands::post(&client, path, file, ctx).await?;
        }

        Commands::Sample { name } => {
            let wva = Wva::from_client(create_client(merged)?);
            commands::sample(&wva, name, ctx).await?;
        }

        Commands::Subscriptions => {
            let wva = Wva::from_client(create_client(merged)?);
            commands::subscriptions(&wva, ctx).await?;
        }

        Commands::Subscribe {
            short_name,
            uri,
            interval,
            buffer,
        } => {
            let wva = Wva::from_client(create_client(merged)?);
            commands::subscribe(&wva, short_name, uri, *interval, buffer, ctx).await?;
        }

        Commands::Unsubscribe { short_name } => {
            let wva = Wva::from_client(create_client(merged)?);
            commands::unsubscribe(&wva, short_name, ctx).await?;
        }

        Commands::Stream => {
            let wva = Wva::from_client(create_client(merged)?);
            commands::stream(&wva, ctx).await?;
        }

        Commands::Configure => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => Config::config_path()?,
            };
            commands::configure(merged, &path, ctx)?;
        }
    }

    Ok(())
}

/// Create a WVA client from the resolved configuration
fn create_client(merged: &MergedConfig) -> Result<WvaClient> {
    let hostname = merged.hostname.as_deref().context(
        "No device hostname; pass --hostname, set WVA_HOSTNAME or run `wva-cli configure`",
    )?;

    let mut config = ClientConfig::new(hostname).with_https(merged.use_https);
    if let Some(username) = &merged.username {
        config = config.with_credentials(username, merged.password.clone().unwrap_or_default());
    }

    WvaClient::new(config).context("Failed to create WVA client")
}
