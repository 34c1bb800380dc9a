//! vith development container CLI

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vith::commands::{LifecycleCommand, StatusCommand};
use vith::context;
use vith::VithConfig;
use vith_shared_types::Barebone;

#[derive(Parser)]
#[command(name = "vith")]
#[command(about = "Development container lifecycle on LXD")]
#[command(version)]
#[command(long_about = "
Development container lifecycle on LXD

Starts, provisions, stops and destroys the container described by the
project file (vith.yml, vith.toml or vith.json) and keeps the configured
host names pointed at its address in /etc/hosts.

Examples:
  vith up                          # Create/start, publish host names, provision once
  vith provision                   # Re-run provisioning (barebone only if never provisioned)
  vith provision --barebone        # Re-run provisioning including barebone setup
  vith halt                        # Unpublish host names and stop
  vith destroy                     # Halt, then delete the container
  vith status -f json              # Show container state as JSON
  vith -c ../other/vith.yml up     # Use a specific project file
")]
struct Cli {
    /// Project configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the container, publish its host names and provision it once
    Up,

    /// Unpublish host names and stop the container
    Halt,

    /// Run provisioning on the running container
    Provision {
        /// Always run barebone setup first
        #[arg(long, conflicts_with = "skip_barebone")]
        barebone: bool,

        /// Never run barebone setup
        #[arg(long)]
        skip_barebone: bool,
    },

    /// Halt and delete the container
    Destroy,

    /// Show container state and host bindings
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

fn barebone_choice(barebone: bool, skip_barebone: bool) -> Barebone {
    if barebone {
        Barebone::Force
    } else if skip_barebone {
        Barebone::Skip
    } else {
        Barebone::Auto
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    let config = VithConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("Cannot load {}", path.display()),
        None => "Cannot load the project file (vith.yml, vith.toml or vith.json)".to_string(),
    })?;

    let lifecycle = Arc::new(context::bootstrap(
        &config,
        context::project_dir(config_path),
    ));

    match &cli.command {
        Commands::Up => LifecycleCommand::new(lifecycle).up().await,
        Commands::Halt => LifecycleCommand::new(lifecycle).halt().await,
        Commands::Provision {
            barebone,
            skip_barebone,
        } => {
            LifecycleCommand::new(lifecycle)
                .provision(barebone_choice(*barebone, *skip_barebone))
                .await
        }
        Commands::Destroy => LifecycleCommand::new(lifecycle).destroy().await,
        Commands::Status { format } => StatusCommand::new(lifecycle).execute(format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Narration is logged at info, so that is the default level
    let log_level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(&cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);

            // Print error chain if in verbose mode
            if cli.verbose || cli.debug {
                for cause in e.chain().skip(1) {
                    eprintln!("  Caused by: {}", cause);
                }
            }
            std::process::exit(1);
        }
    }
}
