//! District agent binary
//!
//! `district serve` runs the agent; the other subcommands are UDP clients
//! against the running district, so every filing and roster change goes
//! through the single serving process that owns the state files.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use judiciary_core::{
    AckResponse, CandidateLawsuit, DistrictListResponse, DistrictRequest, DistrictSearchResponse,
    FileResponse, FilingOutcome, SearchField, TrialListResponse,
};
use judiciary_district::{court, identity, DistrictAgent, DistrictConfig, DistrictMirror, TrialRoster};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RPC_TIMEOUT: Duration = Duration::from_secs(2);
/// A filing walks five stages across every trial and district, so the CLI
/// waits far longer than one RPC.
const FILE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "district", about = "Civil district agent: files lawsuits and coordinates trials")]
struct Cli {
    /// Directory holding the district's state files.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the district agent.
    Serve {
        /// District name (defaults to the persisted identity).
        #[arg(long)]
        name: Option<String>,
        /// UDP address to listen on (defaults to the persisted identity).
        #[arg(long)]
        addr: Option<String>,
        /// The Court's UDP address.
        #[arg(long, default_value = "127.0.0.1:9000")]
        court: String,
        /// Append logs to a file instead of stderr.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// File a new lawsuit through the running district's pipeline.
    File {
        #[arg(long)]
        addr: Option<String>,
        #[arg(long)]
        plaintiff: String,
        #[arg(long)]
        defendant: String,
        #[arg(long)]
        cause: u32,
        /// Claim ids, comma separated (e.g. 10,20,30).
        #[arg(long)]
        claims: String,
    },
    /// Search lawsuits across every trial of the running district.
    Search {
        #[arg(long)]
        addr: Option<String>,
        #[arg(value_enum)]
        field: FieldArg,
        value: String,
    },
    /// Manage the trial roster of the running district.
    Trials {
        #[arg(long)]
        addr: Option<String>,
        #[command(subcommand)]
        command: TrialCommands,
    },
    /// List the district directory (refreshed from the Court when up).
    Districts {
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Subcommand)]
enum TrialCommands {
    List,
    Add { address: String },
    Remove { trial_id: u32 },
}

#[derive(Clone, Copy, ValueEnum)]
enum FieldArg {
    Id,
    Plaintiff,
    Defendant,
    Cause,
    Claim,
}

impl From<FieldArg> for SearchField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Id => SearchField::Id,
            FieldArg::Plaintiff => SearchField::Plaintiff,
            FieldArg::Defendant => SearchField::Defendant,
            FieldArg::Cause => SearchField::Cause,
            FieldArg::Claim => SearchField::Claim,
        }
    }
}

/// Parse "10,20,30" into claim ids. Blank segments are skipped; anything
/// non-numeric is an error.
fn parse_claims(input: &str) -> anyhow::Result<Vec<u32>> {
    let mut claims = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: u32 = part
            .parse()
            .with_context(|| format!("invalid claim id {part:?} (integer expected)"))?;
        claims.push(id);
    }
    if claims.is_empty() {
        anyhow::bail!("no valid claim ids in {input:?}");
    }
    Ok(claims)
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "judiciary=info,district=info".into());
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

fn identity_path(data_dir: &Path) -> PathBuf {
    data_dir.join("district.json")
}

/// Target address for the client subcommands: the flag, or the persisted
/// identity.
fn resolve_addr(addr: Option<String>, data_dir: &Path) -> anyhow::Result<String> {
    if let Some(addr) = addr {
        return Ok(addr);
    }
    let stored = identity::load(&identity_path(data_dir))?;
    if stored.address.is_empty() {
        anyhow::bail!("district address unknown; pass --addr or run `district serve` first");
    }
    Ok(stored.address)
}

async fn serve(
    data_dir: PathBuf,
    name: Option<String>,
    addr: Option<String>,
    court_addr: String,
) -> anyhow::Result<()> {
    let id_path = identity_path(&data_dir);
    let mut stored = identity::load(&id_path)?;

    let name = name
        .or_else(|| (!stored.name.is_empty()).then(|| stored.name.clone()))
        .context("district name unknown; pass --name on first start")?;
    let addr = addr
        .or_else(|| (!stored.address.is_empty()).then(|| stored.address.clone()))
        .context("district address unknown; pass --addr on first start")?;
    if stored.name != name || stored.address != addr {
        stored.name = name.clone();
        stored.address = addr.clone();
        identity::save(&id_path, &stored)?;
    }

    let trials = TrialRoster::load(data_dir.join("trials.json")).await?;
    let mirror = DistrictMirror::load(data_dir.join("districts_local.json")).await?;

    let socket = Arc::new(
        UdpSocket::bind(&addr)
            .await
            .with_context(|| format!("cannot bind {addr}"))?,
    );

    // Self-register before the serve loop owns the socket, so the Court
    // records this listening address. Needs at least one trial; a district
    // that is still empty registers on its next restart.
    let trial_count = trials.count().await as u32;
    if trial_count > 0 {
        match court::register(&socket, &court_addr, &name, trial_count, RPC_TIMEOUT).await {
            Ok(record) => info!(district_id = record.id, "court registration confirmed"),
            Err(e) => warn!(error = %e, "court registration failed, continuing unregistered"),
        }
    } else {
        info!("no trials registered yet, skipping court registration");
    }

    // Seed the mirror (best effort).
    match court::fetch_districts(&court_addr, RPC_TIMEOUT).await {
        Ok(records) => {
            if let Err(e) = mirror.set_all(records).await {
                warn!(error = %e, "could not persist district mirror");
            }
        }
        Err(e) => warn!(error = %e, "could not fetch districts from the court, using mirror"),
    }

    let agent = Arc::new(DistrictAgent::new(
        DistrictConfig {
            name: name.clone(),
            addr: addr.clone(),
            court_addr,
            rpc_timeout: RPC_TIMEOUT,
        },
        trials,
        mirror,
    ));

    info!(name = %name, addr = %addr, "district agent listening");
    judiciary_net::serve(socket, agent).await?;
    Ok(())
}

fn print_outcome(resp: &FileResponse) {
    if !resp.success {
        println!("✗ filing failed: {}", resp.message);
        return;
    }
    println!("✓ {}", resp.message);
    if let Some(outcome) = &resp.outcome {
        match outcome {
            FilingOutcome::Rejected { reason, .. } => {
                println!("  the filing is barred ({reason}); no lawsuit was created")
            }
            FilingOutcome::CreatedRelated { location, .. }
            | FilingOutcome::FreeDistributed { location, .. } => {
                println!("  trial address: {}", location.trial_addr)
            }
            FilingOutcome::MergedClaims { location, .. } => {
                println!("  consolidated at: {}", location.trial_addr)
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            name,
            addr,
            court,
            log_file,
        } => {
            init_tracing(log_file.as_ref())?;
            serve(cli.data_dir, name, addr, court).await
        }

        Commands::File {
            addr,
            plaintiff,
            defendant,
            cause,
            claims,
        } => {
            let addr = resolve_addr(addr, &cli.data_dir)?;
            let candidate = CandidateLawsuit::new(plaintiff, defendant, cause, parse_claims(&claims)?);
            let req = DistrictRequest::LawsuitFile { lawsuit: candidate };
            let resp: FileResponse = judiciary_net::request(&addr, &req, FILE_TIMEOUT).await?;
            print_outcome(&resp);
            Ok(())
        }

        Commands::Search { addr, field, value } => {
            let addr = resolve_addr(addr, &cli.data_dir)?;
            let req = DistrictRequest::SearchLawsuit {
                field: field.into(),
                value,
            };
            let resp: DistrictSearchResponse =
                judiciary_net::request(&addr, &req, FILE_TIMEOUT).await?;
            for hit in &resp.results {
                println!(
                    "[trial {} - {}] [{}] {} | {} v. {} | cause {} | claims {:?}",
                    hit.trial_id,
                    hit.trial_addr,
                    hit.result.list,
                    hit.result.id,
                    hit.result.plaintiff,
                    hit.result.defendant,
                    hit.result.cause_action,
                    hit.result.claims.as_slice()
                );
            }
            println!("{}", resp.message);
            Ok(())
        }

        Commands::Trials { addr, command } => {
            let addr = resolve_addr(addr, &cli.data_dir)?;
            match command {
                TrialCommands::List => {
                    let resp: TrialListResponse =
                        judiciary_net::request(&addr, &DistrictRequest::TrialList, RPC_TIMEOUT)
                            .await?;
                    for t in &resp.trials {
                        println!("trial {} | {}", t.id, t.address);
                    }
                    println!("{}", resp.message);
                }
                TrialCommands::Add { address } => {
                    let req = DistrictRequest::TrialRegister { address };
                    let resp: AckResponse =
                        judiciary_net::request(&addr, &req, RPC_TIMEOUT).await?;
                    println!("{} {}", if resp.success { "✓" } else { "✗" }, resp.message);
                }
                TrialCommands::Remove { trial_id } => {
                    let req = DistrictRequest::TrialRemove { trial_id };
                    let resp: AckResponse =
                        judiciary_net::request(&addr, &req, RPC_TIMEOUT).await?;
                    println!("{} {}", if resp.success { "✓" } else { "✗" }, resp.message);
                }
            }
            Ok(())
        }

        Commands::Districts { addr } => {
            let addr = resolve_addr(addr, &cli.data_dir)?;
            let resp: DistrictListResponse =
                judiciary_net::request(&addr, &DistrictRequest::DistrictList, RPC_TIMEOUT).await?;
            for d in &resp.districts {
                println!("district {} | {} | {} | {} trials", d.id, d.name, d.address, d.trials);
            }
            println!("{}", resp.message);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_claims;

    #[test]
    fn parse_claims_accepts_comma_lists() {
        assert_eq!(parse_claims("10").unwrap(), vec![10]);
        assert_eq!(parse_claims("10, 20,30").unwrap(), vec![10, 20, 30]);
        assert_eq!(parse_claims("10,,20,").unwrap(), vec![10, 20]);
    }

    #[test]
    fn parse_claims_rejects_garbage() {
        assert!(parse_claims("").is_err());
        assert!(parse_claims(" , ").is_err());
        assert!(parse_claims("10,twenty").is_err());
    }
}
