//! Trial agent binary
//!
//! `trial serve` runs the agent: load state, handshake with the district,
//! bind the address the district assigned, answer queries. The other
//! subcommands are thin UDP clients against a running trial; they never
//! touch the serving process's state file.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use judiciary_core::{ListKind, SearchField, SearchResponse, TrialRequest};
use judiciary_trial::{handshake, LawsuitStore, TrialAgent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RPC_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "trial", about = "Civil trial agent: owns a partition of lawsuits")]
struct Cli {
    /// Trial state file.
    #[arg(long, default_value = "lawsuits.json")]
    state_file: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trial agent.
    Serve {
        /// UDP address of this trial's district.
        #[arg(long)]
        district: String,
        /// Numeric id of this trial within its district.
        #[arg(long)]
        id: Option<u32>,
        /// Append logs to a file instead of stderr.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Dismiss an active lawsuit on a running trial.
    Dismiss {
        /// UDP address of the running trial (defaults to the state file's).
        #[arg(long)]
        addr: Option<String>,
        lawsuit_id: String,
        /// Dismiss WITH a merits judgment (default: without).
        #[arg(long)]
        with_merit: bool,
    },
    /// List one of the three lawsuit lists of a running trial.
    List {
        #[arg(long)]
        addr: Option<String>,
        #[arg(value_enum)]
        list: ListArg,
    },
    /// Search a running trial's lawsuits.
    Search {
        #[arg(long)]
        addr: Option<String>,
        #[arg(value_enum)]
        field: FieldArg,
        value: String,
    },
    /// Report a running trial's active workload.
    Workload {
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListArg {
    Active,
    WithMerit,
    WithoutMerit,
}

impl From<ListArg> for ListKind {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Active => ListKind::Active,
            ListArg::WithMerit => ListKind::DismissedWithMerit,
            ListArg::WithoutMerit => ListKind::DismissedWithoutMerit,
        }
    }
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

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "judiciary=info,trial=info".into());
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

/// Target address for the client subcommands: the flag, or whatever the
/// state file says this trial binds.
async fn resolve_addr(addr: Option<String>, state_file: &PathBuf) -> anyhow::Result<String> {
    if let Some(addr) = addr {
        return Ok(addr);
    }
    let store = LawsuitStore::load(state_file).await?;
    let identity = store.identity().await;
    if identity.trial_addr.is_empty() {
        anyhow::bail!(
            "trial address unknown; pass --addr or run `trial serve` once to complete the handshake"
        );
    }
    Ok(identity.trial_addr)
}

async fn serve(state_file: PathBuf, district: String, id: Option<u32>) -> anyhow::Result<()> {
    let store = LawsuitStore::load(&state_file)
        .await
        .with_context(|| format!("cannot load {}", state_file.display()))?;

    // The flag overrides the persisted id; either way one must exist.
    let mut identity = store.identity().await;
    if let Some(id) = id {
        identity.trial_id = id;
        store
            .update_identity(&judiciary_core::TrialIdentity {
                trial_id: id,
                ..Default::default()
            })
            .await?;
    }
    let trial_id = if identity.trial_id > 0 {
        identity.trial_id
    } else {
        anyhow::bail!("trial id unknown; pass --id on first start");
    };

    // Learn (or refresh) who we are. Failure is tolerable when a previous
    // run already mirrored a usable identity.
    match handshake::fetch_identity(&district, trial_id, RPC_TIMEOUT).await {
        Ok(fresh) => store.update_identity(&fresh).await?,
        Err(e) => warn!(district = %district, error = %e, "handshake failed, using mirrored identity"),
    }

    let identity = store.identity().await;
    if identity.trial_addr.is_empty() {
        anyhow::bail!("no trial address: the district is unreachable and no address is mirrored");
    }

    let socket = Arc::new(
        UdpSocket::bind(&identity.trial_addr)
            .await
            .with_context(|| format!("cannot bind {}", identity.trial_addr))?,
    );
    info!(
        addr = %identity.trial_addr,
        trial_id = identity.trial_id,
        district = %identity.district_name,
        "trial agent listening"
    );

    let agent = Arc::new(TrialAgent::new(store));
    judiciary_net::serve(socket, agent).await?;
    Ok(())
}

fn print_results(resp: &SearchResponse) {
    if !resp.success {
        println!("✗ {}", resp.message);
        return;
    }
    for r in &resp.results {
        println!(
            "[{}] {} | {} v. {} | cause {} | claims {:?}",
            r.list,
            r.id,
            r.plaintiff,
            r.defendant,
            r.cause_action,
            r.claims.as_slice()
        );
    }
    println!("{}", resp.message);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            district,
            id,
            log_file,
        } => {
            init_tracing(log_file.as_ref())?;
            serve(cli.state_file, district, id).await
        }

        Commands::Dismiss {
            addr,
            lawsuit_id,
            with_merit,
        } => {
            let addr = resolve_addr(addr, &cli.state_file).await?;
            let req = TrialRequest::LawsuitDismiss {
                lawsuit_id: lawsuit_id.parse()?,
                with_merit,
            };
            let resp: judiciary_core::AckResponse =
                judiciary_net::request(&addr, &req, RPC_TIMEOUT).await?;
            println!("{} {}", if resp.success { "✓" } else { "✗" }, resp.message);
            Ok(())
        }

        Commands::List { addr, list } => {
            let addr = resolve_addr(addr, &cli.state_file).await?;
            let req = TrialRequest::LawsuitList { list: list.into() };
            let resp: SearchResponse = judiciary_net::request(&addr, &req, RPC_TIMEOUT).await?;
            print_results(&resp);
            Ok(())
        }

        Commands::Search { addr, field, value } => {
            let addr = resolve_addr(addr, &cli.state_file).await?;
            let req = TrialRequest::SearchLawsuit {
                field: field.into(),
                value,
            };
            let resp: SearchResponse = judiciary_net::request(&addr, &req, RPC_TIMEOUT).await?;
            print_results(&resp);
            Ok(())
        }

        Commands::Workload { addr } => {
            let addr = resolve_addr(addr, &cli.state_file).await?;
            let resp: judiciary_core::WorkloadResponse =
                judiciary_net::request(&addr, &TrialRequest::WorkloadInfo, RPC_TIMEOUT).await?;
            println!(
                "✓ trial {}: {} active lawsuits",
                resp.identity.trial_id, resp.active_workload
            );
            Ok(())
        }
    }
}
