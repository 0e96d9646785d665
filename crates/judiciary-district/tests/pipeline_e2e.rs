//! End-to-end pipeline scenarios over real UDP sockets
//!
//! Court, districts, and trials run in-process on ephemeral loopback
//! ports; the pipeline under test does its fan-out over the real
//! transport.

use judiciary_core::{
    CandidateLawsuit, CreateReason, DistrictRecord, Error, FilingOutcome, ListKind, MatchKind,
    TrialIdentity,
};
use judiciary_court::{CourtAgent, DistrictDirectory};
use judiciary_district::{court, pipeline, DistrictAgent, DistrictConfig, DistrictMirror, TrialRoster};
use judiciary_trial::{LawsuitStore, TrialAgent};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UdpSocket;

const FAST: Duration = Duration::from_millis(300);
/// A court address nothing listens on; mirror refreshes fall back.
const DEAD_COURT: &str = "127.0.0.1:9";

struct TestTrial {
    addr: String,
    agent: Arc<TrialAgent>,
}

async fn spawn_trial(dir: &Path, district_id: u32, district_name: &str, trial_id: u32) -> TestTrial {
    let store = LawsuitStore::load(dir.join(format!("{district_name}-trial{trial_id}.json")))
        .await
        .unwrap();
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap().to_string();
    store
        .update_identity(&TrialIdentity {
            district_id,
            district_name: district_name.into(),
            trial_id,
            trial_addr: addr.clone(),
        })
        .await
        .unwrap();
    let agent = Arc::new(TrialAgent::new(store));
    tokio::spawn(judiciary_net::serve(socket, agent.clone()));
    TestTrial { addr, agent }
}

struct TestDistrict {
    addr: String,
    agent: Arc<DistrictAgent>,
}

async fn spawn_district(
    dir: &Path,
    name: &str,
    court_addr: &str,
    trial_addrs: &[&str],
    peers: Vec<DistrictRecord>,
) -> TestDistrict {
    let trials = TrialRoster::load(dir.join(format!("{name}-trials.json")))
        .await
        .unwrap();
    for addr in trial_addrs {
        trials.add(*addr).await.unwrap();
    }
    let mirror = DistrictMirror::load(dir.join(format!("{name}-districts.json")))
        .await
        .unwrap();
    mirror.set_all(peers).await.unwrap();

    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = socket.local_addr().unwrap().to_string();
    let agent = Arc::new(DistrictAgent::new(
        DistrictConfig {
            name: name.into(),
            addr: addr.clone(),
            court_addr: court_addr.into(),
            rpc_timeout: FAST,
        },
        trials,
        mirror,
    ));
    tokio::spawn(judiciary_net::serve(socket, agent.clone()));
    TestDistrict { addr, agent }
}

fn candidate(plaintiff: &str, defendant: &str, cause: u32, claims: &[u32]) -> CandidateLawsuit {
    CandidateLawsuit::new(plaintiff, defendant, cause, claims.to_vec())
}

/// Seed one lawsuit on a trial, optionally dismissing it right away.
async fn seed(trial: &TestTrial, c: CandidateLawsuit, dismiss: Option<bool>) -> String {
    let suit = trial
        .agent
        .store()
        .create(&c, CreateReason::Free, None)
        .await
        .unwrap();
    if let Some(with_merit) = dismiss {
        trial.agent.store().dismiss(&suit.id, with_merit).await.unwrap();
    }
    suit.id.to_string()
}

async fn assert_trial_invariants(trial: &TestTrial) {
    let mut ids = Vec::new();
    for kind in [
        ListKind::Active,
        ListKind::DismissedWithMerit,
        ListKind::DismissedWithoutMerit,
    ] {
        for suit in trial.agent.store().list(kind).await {
            ids.push(suit.id.to_string());
        }
    }
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(ids.len(), unique.len(), "a lawsuit id appears in two lists");
}

// ===========================================================================
// Scenario 1 — res judicata blocks the filing
// ===========================================================================

#[tokio::test]
async fn res_judicata_blocks_filing() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    seed(&t1, candidate("Ana", "Bia", 7, &[10, 20]), Some(true)).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Ana", "Bia", 7, &[10, 20]))
        .await
        .unwrap();
    match outcome {
        FilingOutcome::Rejected {
            reason,
            lawsuit_id,
            location,
        } => {
            assert_eq!(reason, MatchKind::ResJudicata);
            assert_eq!(lawsuit_id.to_string(), "1.1.1");
            assert_eq!(location.district_name, "Alpha");
            assert_eq!(location.trial_id, 1);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    // Nothing was created anywhere.
    assert_eq!(t1.agent.store().workload().await, 0);
}

// ===========================================================================
// Scenario 2 — repeated request refiles on the same trial
// ===========================================================================

#[tokio::test]
async fn repeated_request_creates_in_the_same_trial() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let t2 = spawn_trial(dir.path(), 1, "Alpha", 2).await;
    seed(&t2, candidate("Ana", "Bia", 7, &[10, 20]), Some(false)).await;
    let alpha =
        spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr, &t2.addr], vec![]).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Ana", "Bia", 7, &[10, 20]))
        .await
        .unwrap();
    match outcome {
        FilingOutcome::CreatedRelated {
            reason,
            related,
            lawsuit_id,
            location,
        } => {
            assert_eq!(reason, MatchKind::RepeatedRequest);
            assert_eq!(related.to_string(), "1.2.1");
            assert_eq!(lawsuit_id.to_string(), "1.2.2");
            assert_eq!(location.trial_id, 2);
        }
        other => panic!("expected created-related, got {other:?}"),
    }
    // The refiling landed on the trial that dismissed the original.
    assert_eq!(t1.agent.store().workload().await, 0);
    let active = t2.agent.store().list(ListKind::Active).await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id.to_string(), "1.2.2");
}

// ===========================================================================
// Scenario 3 — joinder continent merges claims, creates nothing
// ===========================================================================

#[tokio::test]
async fn joinder_continent_merges_claims() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let existing = seed(&t1, candidate("Ana", "Bia", 7, &[10]), None).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    let outcome =
        pipeline::file_lawsuit(&alpha.agent, &candidate("Ana", "Bia", 7, &[10, 20, 30]))
            .await
            .unwrap();
    match outcome {
        FilingOutcome::MergedClaims {
            lawsuit_id,
            location,
        } => {
            assert_eq!(lawsuit_id.to_string(), existing);
            assert_eq!(location.trial_id, 1);
        }
        other => panic!("expected merged claims, got {other:?}"),
    }
    let active = t1.agent.store().list(ListKind::Active).await;
    assert_eq!(active.len(), 1, "no new lawsuit may be created");
    assert_eq!(active[0].claims.as_slice(), &[10, 20, 30]);
}

// ===========================================================================
// Scenario 4 — connection co-locates across districts
// ===========================================================================

#[tokio::test]
async fn connection_creates_at_the_peer_district() {
    let dir = TempDir::new().unwrap();
    let alpha_t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let beta_t1 = spawn_trial(dir.path(), 2, "Beta", 1).await;
    seed(&beta_t1, candidate("Carlos", "Dora", 9, &[40]), None).await;

    let beta = spawn_district(dir.path(), "Beta", DEAD_COURT, &[&beta_t1.addr], vec![]).await;
    let peers = vec![
        DistrictRecord {
            id: 1,
            name: "Alpha".into(),
            address: String::new(), // filled below once alpha exists
            trials: 1,
        },
        DistrictRecord {
            id: 2,
            name: "Beta".into(),
            address: beta.addr.clone(),
            trials: 1,
        },
    ];
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&alpha_t1.addr], peers).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Eve", "Frank", 9, &[41]))
        .await
        .unwrap();
    match outcome {
        FilingOutcome::CreatedRelated {
            reason,
            related,
            lawsuit_id,
            location,
        } => {
            assert_eq!(reason, MatchKind::Connection);
            assert_eq!(related.to_string(), "2.1.1");
            assert_eq!(lawsuit_id.to_string(), "2.1.2");
            assert_eq!(location.district_name, "Beta");
        }
        other => panic!("expected created-related at Beta, got {other:?}"),
    }

    // Both ends of the connection are linked at Beta's trial.
    let active = beta_t1.agent.store().list(ListKind::Active).await;
    assert_eq!(active.len(), 2);
    assert_eq!(alpha_t1.agent.store().workload().await, 0);
    let first = beta_t1
        .agent
        .store()
        .evaluate(
            judiciary_core::Stage::LisPendens,
            &candidate("Carlos", "Dora", 9, &[40]),
        )
        .await
        .unwrap()
        .1;
    assert_eq!(first.connected.iter().map(|i| i.to_string()).collect::<Vec<_>>(), ["2.1.2"]);
}

// ===========================================================================
// Scenario 5 — free distribution picks the least-loaded trial
// ===========================================================================

#[tokio::test]
async fn free_distribution_picks_the_least_loaded_trial() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let t2 = spawn_trial(dir.path(), 1, "Alpha", 2).await;
    for cause in 1..=5u32 {
        seed(&t1, candidate("P", "D", cause, &[cause]), None).await;
    }
    for cause in 6..=7u32 {
        seed(&t2, candidate("P", "D", cause, &[cause]), None).await;
    }
    let alpha =
        spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr, &t2.addr], vec![]).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Gina", "Hugo", 99, &[77]))
        .await
        .unwrap();
    match outcome {
        FilingOutcome::FreeDistributed {
            lawsuit_id,
            location,
            workload,
        } => {
            assert_eq!(location.trial_id, 2);
            assert_eq!(workload, Some(2));
            assert_eq!(lawsuit_id.to_string(), "1.2.3");
        }
        other => panic!("expected free distribution, got {other:?}"),
    }
    assert_eq!(t1.agent.store().workload().await, 5);
    assert_eq!(t2.agent.store().workload().await, 3);
}

#[tokio::test]
async fn free_distribution_ties_go_to_the_earlier_trial() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let t2 = spawn_trial(dir.path(), 1, "Alpha", 2).await;
    let alpha =
        spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr, &t2.addr], vec![]).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Gina", "Hugo", 99, &[77]))
        .await
        .unwrap();
    match outcome {
        FilingOutcome::FreeDistributed { location, .. } => assert_eq!(location.trial_id, 1),
        other => panic!("expected free distribution, got {other:?}"),
    }
}

#[tokio::test]
async fn free_distribution_without_trials_fails() {
    let dir = TempDir::new().unwrap();
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[], vec![]).await;
    let err = pipeline::file_lawsuit(&alpha.agent, &candidate("Gina", "Hugo", 99, &[77]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoLocalTrials));
    // The serving socket stays healthy regardless.
    assert!(!alpha.addr.is_empty());
}

// ===========================================================================
// Scenario 6 — a dead peer district does not abort the pipeline
// ===========================================================================

#[tokio::test]
async fn peer_timeout_falls_through_to_free_distribution() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;

    // Reserve a port, then free it: Beta is down.
    let dead = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap().to_string();
    drop(dead);

    let peers = vec![DistrictRecord {
        id: 2,
        name: "Beta".into(),
        address: dead_addr,
        trials: 1,
    }];
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], peers).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Eve", "Frank", 9, &[41]))
        .await
        .unwrap();
    assert!(matches!(outcome, FilingOutcome::FreeDistributed { .. }));
    assert_eq!(t1.agent.store().workload().await, 1);
}

// ===========================================================================
// Boundary — stage order decides when both lists would match
// ===========================================================================

#[tokio::test]
async fn res_judicata_outranks_lis_pendens() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    // Identical lawsuits in dismissed-with-merit AND active.
    seed(&t1, candidate("Ana", "Bia", 7, &[10, 20]), Some(true)).await;
    seed(&t1, candidate("Ana", "Bia", 7, &[10, 20]), None).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    let outcome = pipeline::file_lawsuit(&alpha.agent, &candidate("Ana", "Bia", 7, &[10, 20]))
        .await
        .unwrap();
    match outcome {
        FilingOutcome::Rejected { reason, .. } => assert_eq!(reason, MatchKind::ResJudicata),
        other => panic!("expected rejection, got {other:?}"),
    }
}

// ===========================================================================
// Aggregator behavior
// ===========================================================================

#[tokio::test]
async fn aggregator_fills_in_district_identity() {
    let dir = TempDir::new().unwrap();
    let beta_t1 = spawn_trial(dir.path(), 2, "Beta", 1).await;
    seed(&beta_t1, candidate("Carlos", "Dora", 9, &[40]), None).await;
    let beta = spawn_district(dir.path(), "Beta", DEAD_COURT, &[&beta_t1.addr], vec![]).await;

    // Ask Beta directly, the way a peer district would.
    let req = judiciary_core::TrialRequest::LawsuitQuery {
        stage: judiciary_core::Stage::Connection,
        lawsuit: candidate("Eve", "Frank", 9, &[41]),
    };
    let resp: judiciary_core::QueryResponse =
        judiciary_net::request(&beta.addr, &req, FAST).await.unwrap();
    assert!(resp.is_positive());
    assert_eq!(resp.identity.district_name, "Beta");
    assert!(!resp.identity.trial_addr.is_empty());

    // And a stage with no match aggregates to an explicit none.
    let req = judiciary_core::TrialRequest::LawsuitQuery {
        stage: judiciary_core::Stage::ResJudicata,
        lawsuit: candidate("Eve", "Frank", 9, &[41]),
    };
    let resp: judiciary_core::QueryResponse =
        judiciary_net::request(&beta.addr, &req, FAST).await.unwrap();
    assert!(resp.success);
    assert_eq!(resp.matched, MatchKind::None);
}

// ===========================================================================
// Documented race — concurrent duplicate filings
// ===========================================================================

#[tokio::test]
async fn concurrent_duplicate_filings_keep_invariants() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    let c = candidate("Ana", "Bia", 7, &[10, 20]);
    let (a, b) = tokio::join!(
        pipeline::file_lawsuit(&alpha.agent, &c),
        pipeline::file_lawsuit(&alpha.agent, &c),
    );
    // Both outcomes must be decided; duplicates are an accepted race, so
    // anywhere between one and two lawsuits may exist afterwards.
    a.unwrap();
    b.unwrap();
    let count = t1.agent.store().workload().await;
    assert!((1..=2).contains(&count));
    assert_trial_invariants(&t1).await;
}

// ===========================================================================
// The district's own wire surface
// ===========================================================================

#[tokio::test]
async fn lawsuit_file_endpoint_runs_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    let req = judiciary_core::DistrictRequest::LawsuitFile {
        lawsuit: candidate("Ana", "Bia", 7, &[10, 20]),
    };
    let resp: judiciary_core::FileResponse =
        judiciary_net::request(&alpha.addr, &req, Duration::from_secs(30))
            .await
            .unwrap();
    assert!(resp.success, "{}", resp.message);
    assert!(matches!(
        resp.outcome,
        Some(FilingOutcome::FreeDistributed { .. })
    ));
    assert_eq!(t1.agent.store().workload().await, 1);
}

#[tokio::test]
async fn trial_info_serves_the_handshake() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    let identity = judiciary_trial::handshake::fetch_identity(&alpha.addr, 1, FAST)
        .await
        .unwrap();
    assert_eq!(identity.district_name, "Alpha");
    assert_eq!(identity.trial_id, 1);
    assert_eq!(identity.trial_addr, t1.addr);

    // An unregistered trial id is refused.
    let err = judiciary_trial::handshake::fetch_identity(&alpha.addr, 9, FAST)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Refused { .. }));
}

#[tokio::test]
async fn roster_admin_and_search_fan_out() {
    let dir = TempDir::new().unwrap();
    let t1 = spawn_trial(dir.path(), 1, "Alpha", 1).await;
    let t2 = spawn_trial(dir.path(), 1, "Alpha", 2).await;
    seed(&t1, candidate("Ana Maria", "Bia", 7, &[10]), None).await;
    seed(&t2, candidate("Mariana", "Caio", 8, &[20]), None).await;
    let alpha = spawn_district(dir.path(), "Alpha", DEAD_COURT, &[&t1.addr], vec![]).await;

    // Register the second trial through the wire.
    let req = judiciary_core::DistrictRequest::TrialRegister {
        address: t2.addr.clone(),
    };
    let ack: judiciary_core::AckResponse =
        judiciary_net::request(&alpha.addr, &req, FAST).await.unwrap();
    assert!(ack.success, "{}", ack.message);

    let resp: judiciary_core::TrialListResponse =
        judiciary_net::request(&alpha.addr, &judiciary_core::DistrictRequest::TrialList, FAST)
            .await
            .unwrap();
    assert_eq!(resp.trials.len(), 2);

    // The fan-out search now reaches both trials.
    let req = judiciary_core::DistrictRequest::SearchLawsuit {
        field: judiciary_core::SearchField::Plaintiff,
        value: "mari".into(),
    };
    let resp: judiciary_core::DistrictSearchResponse =
        judiciary_net::request(&alpha.addr, &req, Duration::from_secs(5))
            .await
            .unwrap();
    assert_eq!(resp.results.len(), 2);
    let mut trial_ids: Vec<u32> = resp.results.iter().map(|h| h.trial_id).collect();
    trial_ids.sort();
    assert_eq!(trial_ids, vec![1, 2]);
}

// ===========================================================================
// Court integration — registration and the directory round-trip
// ===========================================================================

#[tokio::test]
async fn district_registration_records_the_server_address() {
    let dir = TempDir::new().unwrap();
    let directory = DistrictDirectory::load(dir.path().join("districts.json"))
        .await
        .unwrap();
    let court_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let court_addr = court_socket.local_addr().unwrap().to_string();
    tokio::spawn(judiciary_net::serve(
        court_socket,
        Arc::new(CourtAgent::new(directory)),
    ));

    // Register from the district's (not-yet-serving) server socket.
    let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server_socket.local_addr().unwrap().to_string();
    let record = court::register(&server_socket, &court_addr, "Alpha", 2, FAST)
        .await
        .unwrap();
    assert_eq!(record.address, server_addr);
    assert_eq!(record.id, 1);

    // Re-registration after a restart is the same record.
    let again = court::register(&server_socket, &court_addr, "Alpha", 2, FAST)
        .await
        .unwrap();
    assert_eq!(again.id, 1);

    // A mirror refresh from an ephemeral socket sees the district.
    let listed = court::fetch_districts(&court_addr, FAST).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Alpha");

    // update_trials round-trips too.
    court::update_trials(&court_addr, "Alpha", 3, FAST).await.unwrap();
    let listed = court::fetch_districts(&court_addr, FAST).await.unwrap();
    assert_eq!(listed[0].trials, 3);
}
