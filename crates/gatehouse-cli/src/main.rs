mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::commands::{inspect, serve};

#[derive(Debug, Parser)]
#[command(name = "gatehouse", about = "Session gate and reverse proxy for Supabase-backed apps")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ~/.config/gatehouse/gatehouse.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the default config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Show the configured route sets
    Routes,
    /// Show which route sets a path belongs to
    Check { path: String },
    /// Run the gate in front of the upstream app
    Serve {
        /// Listen address, overriding [server] bind
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gatehouse=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(gatehouse_core::default_config_path);
            let written = gatehouse_core::write_default_config_file(&path, force)?;
            let text = if written {
                format!("Wrote {}", path.display())
            } else {
                format!("{} already exists (use --force to overwrite)", path.display())
            };
            pout(cli.json, serde_json::json!({ "config": path, "written": written }), &text)?;
        }
        Commands::Routes => {
            let config = commands::load_config(cli.config.as_deref())?;
            inspect::cmd_routes(&config, cli.json)?;
        }
        Commands::Check { path } => {
            let config = commands::load_config(cli.config.as_deref())?;
            inspect::cmd_check(&config, &path, cli.json)?;
        }
        Commands::Serve { bind } => {
            let mut config = commands::load_config(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve::cmd_serve(config).await?;
        }
    }

    Ok(())
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
