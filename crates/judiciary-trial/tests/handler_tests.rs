//! Protocol-surface tests: what a trial answers on the wire

use judiciary_core::TrialIdentity;
use judiciary_net::Handler;
use judiciary_trial::{LawsuitStore, TrialAgent};
use std::net::SocketAddr;
use tempfile::TempDir;

async fn agent(dir: &TempDir) -> TrialAgent {
    let store = LawsuitStore::load(dir.path().join("lawsuits.json"))
        .await
        .unwrap();
    store
        .update_identity(&TrialIdentity {
            district_id: 1,
            district_name: "Alpha".into(),
            trial_id: 1,
            trial_addr: "127.0.0.1:9101".into(),
        })
        .await
        .unwrap();
    TrialAgent::new(store)
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

async fn roundtrip(agent: &TrialAgent, json: &str) -> serde_json::Value {
    let reply = agent.handle(json.as_bytes().to_vec(), peer()).await.unwrap();
    serde_json::from_slice(&reply).unwrap()
}

#[tokio::test]
async fn create_then_query_sees_the_lawsuit() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;

    let resp = roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"free","lawsuit":{"plaintiff":"Ana","defendant":"Bia","cause_id":7,"claims":[10,20]}}"#,
    )
    .await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["lawsuit_id"], "1.1.1");
    assert_eq!(resp["district_name"], "Alpha");

    // Read-your-writes: the very next query must see it.
    let resp = roundtrip(
        &agent,
        r#"{"type":"lawsuit_query","stage":"lis_pendens","lawsuit":{"plaintiff":"ana","defendant":"BIA","cause_id":7,"claims":[20,10]}}"#,
    )
    .await;
    assert_eq!(resp["match"], "lis_pendens");
    assert_eq!(resp["lawsuit_id"], "1.1.1");
    assert_eq!(resp["trial_addr"], "127.0.0.1:9101");
}

#[tokio::test]
async fn joinder_query_reports_existing_claims() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;
    roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"free","lawsuit":{"plaintiff":"Ana","defendant":"Bia","cause_id":7,"claims":[10]}}"#,
    )
    .await;

    let resp = roundtrip(
        &agent,
        r#"{"type":"lawsuit_query","stage":"joinder","lawsuit":{"plaintiff":"Ana","defendant":"Bia","cause_id":7,"claims":[10,20,30]}}"#,
    )
    .await;
    assert_eq!(resp["match"], "joinder_continent");
    assert_eq!(resp["existent_claims"], serde_json::json!([10]));
}

#[tokio::test]
async fn connection_query_reports_connected_ids() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;
    roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"free","lawsuit":{"plaintiff":"Carlos","defendant":"Dora","cause_id":9,"claims":[40]}}"#,
    )
    .await;
    roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"connection","lawsuit":{"plaintiff":"Eve","defendant":"Frank","cause_id":9,"claims":[41]},"related":"1.1.1"}"#,
    )
    .await;

    let resp = roundtrip(
        &agent,
        r#"{"type":"lawsuit_query","stage":"connection","lawsuit":{"plaintiff":"Gui","defendant":"Hugo","cause_id":9,"claims":[99]}}"#,
    )
    .await;
    assert_eq!(resp["match"], "connection");
    assert_eq!(resp["lawsuit_id"], "1.1.1");
    assert_eq!(resp["connected_lawsuits"], serde_json::json!(["1.1.2"]));
}

#[tokio::test]
async fn empty_claims_are_rejected_at_create() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;
    let resp = roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"free","lawsuit":{"plaintiff":"Ana","defendant":"Bia","cause_id":7,"claims":[]}}"#,
    )
    .await;
    assert_eq!(resp["success"], false);
    assert!(resp["message"].as_str().unwrap().contains("claims"));
}

#[tokio::test]
async fn workload_reports_the_active_count_only() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;
    roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"free","lawsuit":{"plaintiff":"Ana","defendant":"Bia","cause_id":7,"claims":[10]}}"#,
    )
    .await;
    roundtrip(
        &agent,
        r#"{"type":"lawsuit_create","reason":"free","lawsuit":{"plaintiff":"Carla","defendant":"Davi","cause_id":8,"claims":[11]}}"#,
    )
    .await;
    roundtrip(&agent, r#"{"type":"lawsuit_dismiss","lawsuit_id":"1.1.1","with_merit":true}"#).await;

    let resp = roundtrip(&agent, r#"{"type":"workload_info"}"#).await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["active_workload"], 1);
}

#[tokio::test]
async fn unknown_type_and_stray_replies() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;

    let resp = roundtrip(&agent, r#"{"type":"open_a_window"}"#).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["message"], "unknown type");

    let stray = agent
        .handle(br#"{"success":true,"stage":"joinder","match":"none","message":"late"}"#.to_vec(), peer())
        .await;
    assert!(stray.is_none());
}

#[tokio::test]
async fn unknown_stage_value_is_an_invalid_request() {
    let dir = TempDir::new().unwrap();
    let agent = agent(&dir).await;
    let resp = roundtrip(
        &agent,
        r#"{"type":"lawsuit_query","stage":"appeals","lawsuit":{"plaintiff":"Ana","defendant":"Bia","cause_id":7,"claims":[10]}}"#,
    )
    .await;
    assert_eq!(resp["success"], false);
    assert!(resp["message"].as_str().unwrap().contains("lawsuit_query"));
}
