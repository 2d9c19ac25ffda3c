use clap::{Parser, Subcommand};

use crate::commands;
use crate::constants::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "stockboard")]
#[command(about = "Stock metadata repository and indicator cache server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Run an incremental symbol-list update
    Update,
    /// Manually add one listing to the snapshot
    Add {
        /// Ticker symbol
        symbol: String,
        /// Display name
        name: String,
        /// Market (TW or US)
        #[arg(short, long)]
        market: String,
        /// Category (stock or etf)
        #[arg(short, long, default_value = "stock")]
        category: String,
    },
    /// Show current snapshot statistics
    Status,
}

pub async fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(port).await;
        }
        Commands::Update => {
            commands::update::run().await;
        }
        Commands::Add {
            symbol,
            name,
            market,
            category,
        } => {
            commands::add::run(&symbol, &name, &market, &category).await;
        }
        Commands::Status => {
            commands::status::run().await;
        }
    }
}
