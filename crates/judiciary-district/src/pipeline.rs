//! The five-stage admissibility pipeline
//!
//! Stages run strictly in order; within a stage, local trials are asked
//! first (in roster order) and then every peer district (in mirror order,
//! skipping this district by name). The first positive verdict decides the
//! filing. A peer that times out or errors counts as "no match there";
//! only the final create/merge dispatch is allowed to fail the filing.

use crate::court;
use crate::handlers::DistrictAgent;
use judiciary_core::{
    AckResponse, CandidateLawsuit, CreateReason, CreateResponse, DistrictRecord, Error,
    FilingOutcome, LawsuitId, MatchKind, QueryResponse, Result, Stage, TrialEntry, TrialIdentity,
    TrialRequest,
};
use rand::seq::IndexedRandom;
use tracing::{info, warn};

/// Run the full pipeline for a locally submitted filing.
pub async fn file_lawsuit(
    agent: &DistrictAgent,
    candidate: &CandidateLawsuit,
) -> Result<FilingOutcome> {
    candidate.validate()?;

    // Freshen the mirror so the fan-out sees newly registered districts.
    // A dead Court leaves us on the mirrored copy.
    match court::fetch_districts(agent.court_addr(), agent.rpc_timeout()).await {
        Ok(records) => {
            if let Err(e) = agent.mirror().set_all(records).await {
                warn!(error = %e, "could not persist refreshed district mirror");
            }
        }
        Err(e) => warn!(error = %e, "could not refresh districts from the court, using mirror"),
    }

    let trials = agent.trials().all().await;
    let peers = agent.mirror().all().await;

    for stage in Stage::ALL {
        info!(stage = %stage, "evaluating stage");
        let mut hit = query_local_trials(agent, &trials, stage, candidate).await;
        if hit.is_none() {
            hit = query_peer_districts(agent, &peers, stage, candidate).await;
        }
        if let Some(resp) = hit {
            info!(stage = %stage, matched = %resp.matched, lawsuit = ?resp.lawsuit_id, "stage matched");
            return dispatch(agent, resp, candidate).await;
        }
    }

    free_distribution(agent, &trials, candidate).await
}

/// Ask every local trial for one stage, in roster order; first positive
/// wins. Timeouts and refusals are logged and skipped.
async fn query_local_trials(
    agent: &DistrictAgent,
    trials: &[TrialEntry],
    stage: Stage,
    candidate: &CandidateLawsuit,
) -> Option<QueryResponse> {
    let req = TrialRequest::LawsuitQuery {
        stage,
        lawsuit: candidate.clone(),
    };
    for trial in trials {
        match judiciary_net::request::<_, QueryResponse>(&trial.address, &req, agent.rpc_timeout())
            .await
        {
            Ok(mut resp) if resp.is_positive() => {
                if resp.identity.trial_addr.is_empty() {
                    resp.identity.trial_addr = trial.address.clone();
                }
                if resp.identity.trial_id == 0 {
                    resp.identity.trial_id = trial.id;
                }
                return Some(resp);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(trial = %trial.address, stage = %stage, error = %e, "trial query failed, treating as no match");
            }
        }
    }
    None
}

/// Ask every peer district for one stage, in mirror order, skipping this
/// district by name. Each peer aggregates over its own trials.
async fn query_peer_districts(
    agent: &DistrictAgent,
    peers: &[DistrictRecord],
    stage: Stage,
    candidate: &CandidateLawsuit,
) -> Option<QueryResponse> {
    let req = TrialRequest::LawsuitQuery {
        stage,
        lawsuit: candidate.clone(),
    };
    for peer in peers {
        if peer.name.eq_ignore_ascii_case(agent.name()) {
            continue;
        }
        let addr = peer.address.trim();
        if addr.is_empty() {
            continue;
        }
        match judiciary_net::request::<_, QueryResponse>(addr, &req, agent.rpc_timeout()).await {
            Ok(mut resp) if resp.is_positive() => {
                if resp.identity.district_id == 0 {
                    resp.identity.district_id = peer.id;
                }
                if resp.identity.district_name.is_empty() {
                    resp.identity.district_name = peer.name.clone();
                }
                return Some(resp);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(district = %peer.name, addr = %addr, stage = %stage, error = %e, "peer district query failed, treating as no match");
            }
        }
    }
    None
}

/// Turn a positive stage verdict into the filing's outcome. Transport
/// failures here are fatal for the filing; no second trial is tried.
async fn dispatch(
    agent: &DistrictAgent,
    resp: QueryResponse,
    candidate: &CandidateLawsuit,
) -> Result<FilingOutcome> {
    let matched_id = resp
        .lawsuit_id
        .clone()
        .ok_or_else(|| Error::transport("positive verdict without a lawsuit id"))?;

    match resp.matched {
        MatchKind::ResJudicata | MatchKind::LisPendens | MatchKind::JoinderContained => {
            Ok(FilingOutcome::Rejected {
                reason: resp.matched,
                lawsuit_id: matched_id,
                location: resp.identity,
            })
        }

        MatchKind::RepeatedRequest | MatchKind::Connection => {
            let reason = if resp.matched == MatchKind::RepeatedRequest {
                CreateReason::RepeatedRequest
            } else {
                CreateReason::Connection
            };
            let create =
                create_at(agent, &resp.identity, reason, candidate, Some(&matched_id)).await?;
            let location = prefer_established(create.identity, resp.identity);
            Ok(FilingOutcome::CreatedRelated {
                reason: resp.matched,
                related: matched_id,
                lawsuit_id: create
                    .lawsuit_id
                    .ok_or_else(|| Error::transport("trial returned no lawsuit id"))?,
                location,
            })
        }

        MatchKind::JoinderContinent => {
            let addr = trial_addr_of(&resp.identity)?;
            let req = TrialRequest::LawsuitMergeClaims {
                lawsuit_id: matched_id.clone(),
                new_claims: candidate.claims.clone(),
            };
            let ack: AckResponse =
                judiciary_net::request(addr, &req, agent.rpc_timeout()).await?;
            if !ack.success {
                return Err(Error::refused(addr, ack.message));
            }
            Ok(FilingOutcome::MergedClaims {
                lawsuit_id: matched_id,
                location: resp.identity,
            })
        }

        MatchKind::None => Err(Error::transport("dispatch called on a none verdict")),
    }
}

/// No stage matched: place the filing on the least-loaded local trial.
async fn free_distribution(
    agent: &DistrictAgent,
    trials: &[TrialEntry],
    candidate: &CandidateLawsuit,
) -> Result<FilingOutcome> {
    if trials.is_empty() {
        return Err(Error::NoLocalTrials);
    }

    let mut best: Option<(&TrialEntry, usize)> = None;
    for trial in trials {
        match judiciary_net::request::<_, judiciary_core::WorkloadResponse>(
            &trial.address,
            &TrialRequest::WorkloadInfo,
            agent.rpc_timeout(),
        )
        .await
        {
            Ok(resp) if resp.success => {
                // Strict less-than keeps the earliest trial on ties.
                if best.is_none_or(|(_, w)| resp.active_workload < w) {
                    best = Some((trial, resp.active_workload));
                }
            }
            Ok(resp) => {
                warn!(trial = %trial.address, message = %resp.message, "workload query refused");
            }
            Err(e) => {
                warn!(trial = %trial.address, error = %e, "workload query failed");
            }
        }
    }

    let (chosen, workload) = match best {
        Some((trial, w)) => {
            info!(trial = %trial.address, workload = w, "free distribution to least-loaded trial");
            (trial, Some(w))
        }
        None => {
            let trial = trials
                .choose(&mut rand::rng())
                .expect("roster checked non-empty above");
            warn!(trial = %trial.address, "no workload responses, falling back to a random trial");
            (trial, None)
        }
    };

    let target = TrialIdentity {
        trial_id: chosen.id,
        trial_addr: chosen.address.clone(),
        ..Default::default()
    };
    let create = create_at(agent, &target, CreateReason::Free, candidate, None).await?;
    let mut location = prefer_established(create.identity, target);
    if location.trial_addr.is_empty() {
        location.trial_addr = chosen.address.clone();
    }
    Ok(FilingOutcome::FreeDistributed {
        lawsuit_id: create
            .lawsuit_id
            .ok_or_else(|| Error::transport("trial returned no lawsuit id"))?,
        location,
        workload,
    })
}

async fn create_at(
    agent: &DistrictAgent,
    target: &TrialIdentity,
    reason: CreateReason,
    candidate: &CandidateLawsuit,
    related: Option<&LawsuitId>,
) -> Result<CreateResponse> {
    let addr = trial_addr_of(target)?;
    let req = TrialRequest::LawsuitCreate {
        reason,
        lawsuit: candidate.clone(),
        related: related.cloned(),
    };
    let resp: CreateResponse = judiciary_net::request(addr, &req, agent.rpc_timeout()).await?;
    if !resp.success {
        return Err(Error::refused(addr, resp.message));
    }
    Ok(resp)
}

fn trial_addr_of(identity: &TrialIdentity) -> Result<&str> {
    if identity.trial_addr.is_empty() {
        return Err(Error::transport("matched trial did not report its address"));
    }
    Ok(&identity.trial_addr)
}

fn prefer_established(primary: TrialIdentity, fallback: TrialIdentity) -> TrialIdentity {
    if primary.is_established() {
        primary
    } else {
        fallback
    }
}
