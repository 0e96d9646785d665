//! Court agent binary
//!
//! `court serve` runs the registry. `list` and `remove` are UDP clients
//! against a running Court (districts register themselves; there is no
//! manual add, because `create` records the sender's address).

use anyhow::Context;
use clap::{Parser, Subcommand};
use judiciary_core::{CourtRequest, CourtResponse};
use judiciary_court::{CourtAgent, DistrictDirectory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RPC_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_ADDR: &str = "127.0.0.1:9000";

#[derive(Parser)]
#[command(name = "court", about = "Court of Justice registry agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Court registry.
    Serve {
        /// UDP address to listen on.
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
        /// Directory holding the Court's state file.
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,
        /// Append logs to a file instead of stderr.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// List the registered districts of a running Court.
    List {
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },
    /// Remove a district by name from a running Court.
    Remove {
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
        name: String,
    },
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "judiciary=info,court=info".into());
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::sync::Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            addr,
            data_dir,
            log_file,
        } => {
            init_tracing(log_file.as_ref())?;
            let directory = DistrictDirectory::load(data_dir.join("districts.json")).await?;
            let socket = Arc::new(
                UdpSocket::bind(&addr)
                    .await
                    .with_context(|| format!("cannot bind {addr}"))?,
            );
            info!(addr = %addr, "court registry listening");
            judiciary_net::serve(socket, Arc::new(CourtAgent::new(directory))).await?;
            Ok(())
        }

        Commands::List { addr } => {
            let resp: CourtResponse =
                judiciary_net::request(&addr, &CourtRequest::List, RPC_TIMEOUT).await?;
            if !resp.success {
                anyhow::bail!("court refused: {}", resp.message);
            }
            let districts = resp.districts.unwrap_or_default();
            for d in &districts {
                println!("district {} | {} | {} | {} trials", d.id, d.name, d.address, d.trials);
            }
            println!("{} districts registered", districts.len());
            Ok(())
        }

        Commands::Remove { addr, name } => {
            let req = CourtRequest::Remove { name };
            let resp: CourtResponse = judiciary_net::request(&addr, &req, RPC_TIMEOUT).await?;
            println!("{} {}", if resp.success { "✓" } else { "✗" }, resp.message);
            Ok(())
        }
    }
}
