mod commands;
mod output;
mod workspace;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "armada")]
#[command(about = "Declarative Azure resources, reconciled", long_about = None)]
struct Cli {
    /// Configuration file (skips discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes apply would make
    Plan {
        /// Compare against the stored state without reading remote objects
        #[arg(long)]
        no_refresh: bool,
    },
    /// Create, update and delete remote objects to match the configuration
    Apply {
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
        /// Compare against the stored state without reading remote objects
        #[arg(long)]
        no_refresh: bool,
    },
    /// Start tracking an existing remote object
    Import {
        /// Resource name in the configuration
        name: String,
        /// Remote object ID
        id: String,
        /// Resource type, required when the name is not declared in the configuration
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },
    /// Re-read every tracked object and update the state
    Refresh,
    /// Delete tracked remote objects
    Destroy {
        /// Resources to destroy (all when omitted)
        targets: Vec<String>,
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show tracked resources
    Show {
        /// Resource name (all when omitted)
        name: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read the data sources declared in the configuration
    Data {
        /// Data source name (all when omitted)
        name: Option<String>,
    },
    /// List supported resource types
    Types,
    /// Show version information
    Version,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let load_config = || workspace::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Plan { no_refresh } => {
            commands::plan::handle(&load_config()?, !no_refresh).await?;
        }
        Commands::Apply { yes, no_refresh } => {
            commands::apply::handle(&load_config()?, yes, !no_refresh).await?;
        }
        Commands::Import { name, id, kind } => {
            commands::import::handle(&load_config()?, &name, &id, kind.as_deref()).await?;
        }
        Commands::Refresh => {
            commands::refresh::handle(&load_config()?).await?;
        }
        Commands::Destroy { targets, yes } => {
            commands::destroy::handle(&load_config()?, &targets, yes).await?;
        }
        Commands::Show { name, json } => {
            commands::show::handle(&load_config()?, name.as_deref(), json).await?;
        }
        Commands::Data { name } => {
            commands::data::handle(&load_config()?, name.as_deref()).await?;
        }
        Commands::Types => {
            commands::types::handle();
        }
        Commands::Version => {
            println!("armada {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
