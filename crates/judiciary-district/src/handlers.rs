//! UDP request handlers for the district agent
//!
//! Two audiences share the socket: trials and peer districts (handshake
//! and aggregate queries) and this district's own CLI (filing, roster and
//! mirror admin). Stray datagrams that look like late replies (valid JSON
//! without a `type` tag) are dropped instead of answered, so two agents
//! can never trade error replies forever.

use crate::roster::{DistrictMirror, TrialRoster};
use crate::{court, pipeline};
use judiciary_core::{
    AckResponse, CandidateLawsuit, DistrictListResponse, DistrictRequest, DistrictSearchHit,
    DistrictSearchResponse, Envelope, ErrorReply, FileResponse, FilingOutcome, QueryResponse,
    SearchField, SearchResponse, Stage, TrialIdentity, TrialInfoResponse, TrialListResponse,
    TrialRequest,
};
use judiciary_net::Handler;
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

const KNOWN_TYPES: &[&str] = &[
    "trial_info",
    "lawsuit_query",
    "lawsuit_file",
    "trial_register",
    "trial_remove",
    "trial_list",
    "district_list",
    "search_lawsuit",
];

/// Static configuration of one district agent.
#[derive(Clone, Debug)]
pub struct DistrictConfig {
    pub name: String,
    pub addr: String,
    pub court_addr: String,
    pub rpc_timeout: Duration,
}

/// The district agent: rosters plus the protocol surface around them.
pub struct DistrictAgent {
    config: DistrictConfig,
    trials: TrialRoster,
    mirror: DistrictMirror,
}

impl DistrictAgent {
    pub fn new(config: DistrictConfig, trials: TrialRoster, mirror: DistrictMirror) -> Self {
        Self {
            config,
            trials,
            mirror,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn court_addr(&self) -> &str {
        &self.config.court_addr
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.config.rpc_timeout
    }

    pub fn trials(&self) -> &TrialRoster {
        &self.trials
    }

    pub fn mirror(&self) -> &DistrictMirror {
        &self.mirror
    }

    /// This district's numeric id, as far as the mirror knows it.
    async fn own_district_id(&self) -> u32 {
        self.mirror
            .find_by_name(&self.config.name)
            .await
            .map(|d| d.id)
            .unwrap_or(0)
    }

    async fn handle_trial_info(&self, trial_id: u32) -> TrialInfoResponse {
        let Some(trial) = self.trials.find(trial_id).await else {
            return TrialInfoResponse::err(format!(
                "trial {trial_id} is not registered in this district"
            ));
        };
        TrialInfoResponse::ok(
            "trial identity resolved",
            TrialIdentity {
                district_id: self.own_district_id().await,
                district_name: self.config.name.clone(),
                trial_id: trial.id,
                trial_addr: trial.address,
            },
        )
    }

    /// Aggregate a peer district's stage query over every local trial and
    /// return the first positive verdict, with this district's identity
    /// filled in where the trial left it blank.
    async fn handle_aggregate_query(
        &self,
        stage: Stage,
        candidate: CandidateLawsuit,
    ) -> QueryResponse {
        let trials = self.trials.all().await;
        let req = TrialRequest::LawsuitQuery {
            stage,
            lawsuit: candidate,
        };
        for trial in &trials {
            match judiciary_net::request::<_, QueryResponse>(
                &trial.address,
                &req,
                self.config.rpc_timeout,
            )
            .await
            {
                Ok(mut resp) if resp.is_positive() => {
                    if resp.identity.trial_addr.is_empty() {
                        resp.identity.trial_addr = trial.address.clone();
                    }
                    if resp.identity.district_name.is_empty() {
                        resp.identity.district_name = self.config.name.clone();
                    }
                    if resp.identity.district_id == 0 {
                        resp.identity.district_id = self.own_district_id().await;
                    }
                    return resp;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(trial = %trial.address, stage = %stage, error = %e, "aggregate query to trial failed");
                }
            }
        }
        let mut none = QueryResponse::none(stage, TrialIdentity::default());
        none.message = "no corresponding lawsuit was found in this district".to_string();
        none
    }

    async fn handle_file(&self, candidate: CandidateLawsuit) -> FileResponse {
        match pipeline::file_lawsuit(self, &candidate).await {
            Ok(outcome) => FileResponse::ok(outcome_message(&outcome), outcome),
            Err(e) => FileResponse::err(e.to_string()),
        }
    }

    async fn handle_trial_register(&self, address: String) -> AckResponse {
        match self.trials.add(address).await {
            Ok(entry) => {
                self.notify_trial_count().await;
                AckResponse::ok(format!(
                    "trial {} registered at {}",
                    entry.id, entry.address
                ))
            }
            Err(e) => AckResponse::err(e.to_string()),
        }
    }

    async fn handle_trial_remove(&self, trial_id: u32) -> AckResponse {
        match self.trials.remove(trial_id).await {
            Ok(entry) => {
                self.notify_trial_count().await;
                AckResponse::ok(format!("trial {} removed", entry.id))
            }
            Err(e) => AckResponse::err(e.to_string()),
        }
    }

    /// Fire-and-forget: the roster ack must not wait on the Court.
    async fn notify_trial_count(&self) {
        let count = self.trials.count().await as u32;
        let court_addr = self.config.court_addr.clone();
        let name = self.config.name.clone();
        let deadline = self.config.rpc_timeout;
        tokio::spawn(async move {
            if let Err(e) = court::update_trials(&court_addr, &name, count, deadline).await {
                warn!(error = %e, "could not notify the court of the new trial count");
            }
        });
    }

    async fn handle_district_list(&self) -> DistrictListResponse {
        match court::fetch_districts(&self.config.court_addr, self.config.rpc_timeout).await {
            Ok(records) => {
                if let Err(e) = self.mirror.set_all(records.clone()).await {
                    warn!(error = %e, "could not persist refreshed district mirror");
                }
                DistrictListResponse {
                    success: true,
                    message: "district list refreshed from the court".to_string(),
                    districts: records,
                }
            }
            Err(e) => {
                warn!(error = %e, "court unreachable, returning mirrored district list");
                DistrictListResponse {
                    success: true,
                    message: format!("court unreachable ({e}), returning mirrored list"),
                    districts: self.mirror.all().await,
                }
            }
        }
    }

    async fn handle_search(&self, field: SearchField, value: String) -> DistrictSearchResponse {
        let trials = self.trials.all().await;
        let req = TrialRequest::SearchLawsuit { field, value };
        let mut hits = Vec::new();
        for trial in &trials {
            match judiciary_net::request::<_, SearchResponse>(
                &trial.address,
                &req,
                self.config.rpc_timeout,
            )
            .await
            {
                Ok(resp) if resp.success => {
                    for result in resp.results {
                        hits.push(DistrictSearchHit {
                            trial_id: if resp.identity.trial_id > 0 {
                                resp.identity.trial_id
                            } else {
                                trial.id
                            },
                            trial_addr: trial.address.clone(),
                            result,
                        });
                    }
                }
                Ok(resp) => {
                    warn!(trial = %trial.address, message = %resp.message, "search refused by trial");
                }
                Err(e) => {
                    warn!(trial = %trial.address, error = %e, "search query to trial failed");
                }
            }
        }
        DistrictSearchResponse {
            success: true,
            message: format!("{} lawsuits found across {} trials", hits.len(), trials.len()),
            results: hits,
        }
    }
}

fn outcome_message(outcome: &FilingOutcome) -> String {
    match outcome {
        FilingOutcome::Rejected {
            reason,
            lawsuit_id,
            location,
        } => format!(
            "filing rejected ({reason}): blocked by lawsuit {lawsuit_id} at {}/trial {}",
            location.district_name, location.trial_id
        ),
        FilingOutcome::CreatedRelated {
            reason,
            related,
            lawsuit_id,
            location,
        } => format!(
            "lawsuit {lawsuit_id} created at {}/trial {} ({reason}, related to {related})",
            location.district_name, location.trial_id
        ),
        FilingOutcome::MergedClaims {
            lawsuit_id,
            location,
        } => format!(
            "claims merged into lawsuit {lawsuit_id} at {}/trial {}",
            location.district_name, location.trial_id
        ),
        FilingOutcome::FreeDistributed {
            lawsuit_id,
            location,
            workload,
        } => match workload {
            Some(w) => format!(
                "lawsuit {lawsuit_id} created by free distribution at trial {} (workload {w})",
                location.trial_id
            ),
            None => format!(
                "lawsuit {lawsuit_id} created by free distribution at trial {} (random fallback)",
                location.trial_id
            ),
        },
    }
}

fn encode<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "failed to encode reply");
            None
        }
    }
}

impl Handler for DistrictAgent {
    async fn handle(&self, data: Vec<u8>, peer: SocketAddr) -> Option<Vec<u8>> {
        let req = match serde_json::from_slice::<DistrictRequest>(&data) {
            Ok(req) => req,
            Err(e) => {
                let reply = match serde_json::from_slice::<Envelope>(&data) {
                    Ok(env) if !KNOWN_TYPES.contains(&env.kind.as_str()) => {
                        warn!(%peer, kind = %env.kind, "unknown request type");
                        ErrorReply::unknown_type()
                    }
                    Ok(env) => {
                        warn!(%peer, kind = %env.kind, error = %e, "invalid request");
                        ErrorReply::new(format!("invalid {} request: {e}", env.kind))
                    }
                    Err(_) if serde_json::from_slice::<serde_json::Value>(&data).is_ok() => {
                        // A tag-less JSON object is a stray reply, not a
                        // request; answering it would start an error loop.
                        warn!(%peer, "dropping tag-less datagram");
                        return None;
                    }
                    Err(_) => {
                        warn!(%peer, error = %e, "malformed datagram");
                        ErrorReply::malformed()
                    }
                };
                return encode(&reply);
            }
        };

        match req {
            DistrictRequest::TrialInfo { trial_id } => {
                let resp = self.handle_trial_info(trial_id).await;
                info!(%peer, trial_id, success = resp.success, "trial_info answered");
                encode(&resp)
            }

            DistrictRequest::LawsuitQuery { stage, lawsuit } => {
                let resp = self.handle_aggregate_query(stage, lawsuit).await;
                info!(%peer, stage = %stage, matched = %resp.matched, "aggregate lawsuit_query answered");
                encode(&resp)
            }

            DistrictRequest::LawsuitFile { lawsuit } => {
                info!(%peer, plaintiff = %lawsuit.plaintiff, defendant = %lawsuit.defendant, "filing received");
                let resp = self.handle_file(lawsuit).await;
                info!(%peer, success = resp.success, message = %resp.message, "filing decided");
                encode(&resp)
            }

            DistrictRequest::TrialRegister { address } => {
                encode(&self.handle_trial_register(address).await)
            }

            DistrictRequest::TrialRemove { trial_id } => {
                encode(&self.handle_trial_remove(trial_id).await)
            }

            DistrictRequest::TrialList => {
                let trials = self.trials.all().await;
                encode(&TrialListResponse {
                    success: true,
                    message: format!("{} trials registered", trials.len()),
                    trials,
                })
            }

            DistrictRequest::DistrictList => encode(&self.handle_district_list().await),

            DistrictRequest::SearchLawsuit { field, value } => {
                encode(&self.handle_search(field, value).await)
            }
        }
    }
}
