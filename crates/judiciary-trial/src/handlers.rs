//! UDP request handlers for the trial agent
//!
//! Dispatches on the wire `type` tag. Query and create responses always
//! carry the trial's identity block so the asking district can cite where
//! the answer came from.

use crate::store::LawsuitStore;
use judiciary_core::{
    AckResponse, CandidateLawsuit, CreateReason, CreateResponse, Envelope, ErrorReply, LawsuitId,
    MatchKind, QueryResponse, SearchResponse, Stage, TrialRequest, WorkloadResponse,
};
use judiciary_net::Handler;
use serde::Serialize;
use std::net::SocketAddr;
use tracing::{info, warn};

const KNOWN_TYPES: &[&str] = &[
    "lawsuit_query",
    "lawsuit_create",
    "lawsuit_merge_claims",
    "lawsuit_dismiss",
    "search_lawsuit",
    "workload_info",
    "lawsuit_list",
];

/// The trial agent: a lawsuit store plus the protocol surface around it.
pub struct TrialAgent {
    store: LawsuitStore,
}

impl TrialAgent {
    pub fn new(store: LawsuitStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LawsuitStore {
        &self.store
    }

    async fn handle_query(&self, stage: Stage, candidate: CandidateLawsuit) -> QueryResponse {
        let identity = self.store.identity().await;
        let Some((kind, suit)) = self.store.evaluate(stage, &candidate).await else {
            return QueryResponse::none(stage, identity);
        };

        let message = match kind {
            MatchKind::ResJudicata => {
                "identical lawsuit found among dismissals with a merits judgment (res judicata)"
            }
            MatchKind::LisPendens => "identical lawsuit found among the active lawsuits (lis pendens)",
            MatchKind::RepeatedRequest => {
                "identical lawsuit found among dismissals without a merits judgment (repeated request)"
            }
            MatchKind::JoinderContained => {
                "the new lawsuit's claims are contained in an existing lawsuit"
            }
            MatchKind::JoinderContinent => {
                "an existing lawsuit's claims are contained in the new lawsuit"
            }
            MatchKind::Connection => {
                "connected lawsuit found (shared cause of action and/or common claims)"
            }
            MatchKind::None => unreachable!("evaluate never returns a none verdict"),
        };

        let mut resp = QueryResponse::matched(stage, kind, message, suit.id.clone(), identity);
        match kind {
            MatchKind::JoinderContained | MatchKind::JoinderContinent => {
                resp.existent_claims = Some(suit.claims.clone());
            }
            MatchKind::Connection if !suit.connected.is_empty() => {
                resp.connected_lawsuits = Some(suit.connected.clone());
            }
            _ => {}
        }
        resp
    }

    async fn handle_create(
        &self,
        reason: CreateReason,
        candidate: CandidateLawsuit,
        related: Option<LawsuitId>,
    ) -> CreateResponse {
        let identity = self.store.identity().await;
        match self.store.create(&candidate, reason, related.as_ref()).await {
            Ok(suit) => {
                let message = match (reason, &related) {
                    (CreateReason::Free, _) => "lawsuit created by free distribution".to_string(),
                    (CreateReason::RepeatedRequest, Some(r)) => {
                        format!("lawsuit created as a repeated request (related to {r})")
                    }
                    (CreateReason::RepeatedRequest, None) => {
                        "lawsuit created as a repeated request".to_string()
                    }
                    (CreateReason::Connection, Some(r)) => {
                        format!("lawsuit created as connected to {r}")
                    }
                    (CreateReason::Connection, None) => "lawsuit created as connected".to_string(),
                };
                CreateResponse::ok(message, suit.id, identity)
            }
            Err(e) => CreateResponse::err(e.to_string(), identity),
        }
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

impl Handler for TrialAgent {
    async fn handle(&self, data: Vec<u8>, peer: SocketAddr) -> Option<Vec<u8>> {
        let req = match serde_json::from_slice::<TrialRequest>(&data) {
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
            TrialRequest::LawsuitQuery { stage, lawsuit } => {
                let resp = self.handle_query(stage, lawsuit).await;
                info!(%peer, stage = %stage, matched = %resp.matched, "lawsuit_query answered");
                encode(&resp)
            }

            TrialRequest::LawsuitCreate {
                reason,
                lawsuit,
                related,
            } => {
                let resp = self.handle_create(reason, lawsuit, related).await;
                info!(
                    %peer,
                    success = resp.success,
                    lawsuit = %resp.lawsuit_id.as_ref().map(|i| i.to_string()).unwrap_or_default(),
                    "lawsuit_create answered"
                );
                encode(&resp)
            }

            TrialRequest::LawsuitMergeClaims {
                lawsuit_id,
                new_claims,
            } => {
                let resp = match self.store.merge_claims(&lawsuit_id, &new_claims).await {
                    Ok(_) => AckResponse::ok(format!("claims merged into lawsuit {lawsuit_id}")),
                    Err(e) => AckResponse::err(e.to_string()),
                };
                info!(%peer, lawsuit = %lawsuit_id, success = resp.success, "lawsuit_merge_claims answered");
                encode(&resp)
            }

            TrialRequest::LawsuitDismiss {
                lawsuit_id,
                with_merit,
            } => {
                let resp = match self.store.dismiss(&lawsuit_id, with_merit).await {
                    Ok(_) if with_merit => {
                        AckResponse::ok(format!("lawsuit {lawsuit_id} dismissed with merit"))
                    }
                    Ok(_) => AckResponse::ok(format!("lawsuit {lawsuit_id} dismissed without merit")),
                    Err(e) => AckResponse::err(e.to_string()),
                };
                info!(%peer, lawsuit = %lawsuit_id, with_merit, success = resp.success, "lawsuit_dismiss answered");
                encode(&resp)
            }

            TrialRequest::SearchLawsuit { field, value } => {
                let results = self.store.search(field, &value).await;
                let resp = SearchResponse {
                    success: true,
                    message: format!("{} lawsuits found", results.len()),
                    identity: self.store.identity().await,
                    results,
                };
                info!(%peer, hits = resp.results.len(), "search_lawsuit answered");
                encode(&resp)
            }

            TrialRequest::WorkloadInfo => {
                let resp = WorkloadResponse {
                    success: true,
                    message: "active workload reported".to_string(),
                    identity: self.store.identity().await,
                    active_workload: self.store.workload().await,
                };
                info!(%peer, workload = resp.active_workload, "workload_info answered");
                encode(&resp)
            }

            TrialRequest::LawsuitList { list } => {
                let results = self.store.list(list).await;
                let resp = SearchResponse {
                    success: true,
                    message: format!("{} lawsuits in list '{list}'", results.len()),
                    identity: self.store.identity().await,
                    results,
                };
                encode(&resp)
            }
        }
    }
}
