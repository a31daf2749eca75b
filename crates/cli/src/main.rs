//! Chainloom CLI: the main entry point.
//!
//! Commands:
//! - `feedback` triages customer feedback with a parallel analysis pipeline
//! - `chat`     talks to the demo agent, one message or interactively
//! - `render`   fills in a prompt template
//! - `config`   prints the default or effective configuration

use anyhow::Context;
use chainloom_config::{LogFormat, LoggingConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "chainloom",
    about = "Chainloom: composable pipelines and a tool-using agent runtime",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.chainloom/config.toml)
    #[arg(short, long, global = true, env = "CHAINLOOM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze customer feedback and draft a reply
    Feedback {
        /// The feedback text
        #[arg(required = true)]
        text: Vec<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat with the demo agent
    Chat {
        /// Session to append to
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Render a prompt template
    Render {
        /// Template text with {placeholders}
        template: String,

        /// A variable as key=value, repeatable
        #[arg(long = "var", value_parser = chainloom::parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Print configuration as TOML
    Config {
        /// Show the loaded configuration instead of the defaults
        #[arg(long)]
        effective: bool,
    },
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = chainloom::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Feedback { text, json } => commands::feedback::run(&text.join(" "), json).await?,
        Commands::Chat { session, message } => {
            commands::chat::run(&config, &session, message).await?
        }
        Commands::Render { template, vars } => commands::render::run(&template, vars)?,
        Commands::Config { effective } => commands::config_cmd::run(&config, effective)?,
    }

    Ok(())
}
