//! UDP request handlers for the Court registry

use crate::directory::DistrictDirectory;
use judiciary_core::{CourtRequest, CourtResponse, Envelope, ErrorReply};
use judiciary_net::Handler;
use serde::Serialize;
use std::net::SocketAddr;
use tracing::{info, warn};

const KNOWN_TYPES: &[&str] = &["list", "create", "remove", "update_trials"];

pub struct CourtAgent {
    directory: DistrictDirectory,
}

impl CourtAgent {
    pub fn new(directory: DistrictDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &DistrictDirectory {
        &self.directory
    }

    async fn dispatch(&self, req: CourtRequest, peer: SocketAddr) -> CourtResponse {
        match req {
            CourtRequest::List => {
                let districts = self.directory.list_except(&peer.to_string()).await;
                CourtResponse::ok("ok").with_districts(districts)
            }

            CourtRequest::Create { name, trials } => {
                match self
                    .directory
                    .create(&name, &peer.to_string(), trials)
                    .await
                {
                    Ok((record, true)) => {
                        CourtResponse::ok("district created").with_district(record)
                    }
                    // Duplicate names are a successful idempotent lookup.
                    Ok((record, false)) => {
                        CourtResponse::ok("district already registered").with_district(record)
                    }
                    Err(e) => CourtResponse::err(e.to_string()),
                }
            }

            CourtRequest::Remove { name } => match self.directory.remove(&name).await {
                Ok(record) => CourtResponse::ok("district removed").with_district(record),
                Err(e) => CourtResponse::err(e.to_string()),
            },

            CourtRequest::UpdateTrials { name, trials } => {
                match self.directory.update_trials(&name, trials).await {
                    Ok(record) => CourtResponse::ok("trial count updated").with_district(record),
                    Err(e) => CourtResponse::err(e.to_string()),
                }
            }
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

impl Handler for CourtAgent {
    async fn handle(&self, data: Vec<u8>, peer: SocketAddr) -> Option<Vec<u8>> {
        let req = match serde_json::from_slice::<CourtRequest>(&data) {
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

        let resp = self.dispatch(req, peer).await;
        info!(%peer, success = resp.success, message = %resp.message, "court request answered");
        encode(&resp)
    }
}
