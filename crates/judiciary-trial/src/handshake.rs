//! Startup handshake — a trial learns who it is from its district
//!
//! The trial knows only its district's address and its numeric id; the
//! district answers `trial_info` with the district id and name and the
//! address this trial should bind. The result is mirrored to disk so a
//! later start can come up even when the district is unreachable.

use judiciary_core::{DistrictRequest, Error, Result, TrialIdentity, TrialInfoResponse};
use std::time::Duration;
use tracing::info;

pub async fn fetch_identity(
    district_addr: &str,
    trial_id: u32,
    deadline: Duration,
) -> Result<TrialIdentity> {
    if trial_id == 0 {
        return Err(Error::validation("trial id must be positive"));
    }

    let req = DistrictRequest::TrialInfo { trial_id };
    let resp: TrialInfoResponse = judiciary_net::request(district_addr, &req, deadline).await?;
    if !resp.success {
        return Err(Error::refused(district_addr, resp.message));
    }

    info!(
        district_id = resp.identity.district_id,
        district_name = %resp.identity.district_name,
        trial_id = resp.identity.trial_id,
        trial_addr = %resp.identity.trial_addr,
        "handshake complete"
    );
    Ok(resp.identity)
}
