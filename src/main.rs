use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tradeforge", version, about = "Automated strategy pipeline: generate, backtest, and deploy trading strategies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the HTTP/WebSocket API server (sessions, deployments, backtests).
    Serve {
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: SocketAddr,
    },
    /// Applies pending database migrations and exits.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = configuration::load_config(None)?;
    let _guard = configuration::init_tracing(&config.logging)?;

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve { addr: "0.0.0.0:3000".parse().unwrap() }) {
        Commands::Serve { addr } => {
            tracing::info!("tradeforge server starting");
            web_server::run_server(addr).await?;
        }
        Commands::Migrate => {
            let pool = database::connect().await?;
            database::run_migrations(&pool).await?;
            tracing::info!("migrations applied");
        }
    }

    Ok(())
}
