//! Client side of the Court registry protocol
//!
//! Everything here is best effort from the district's point of view: a
//! Court that is down degrades the district to its mirrored directory, it
//! never stops filings.

use judiciary_core::{CourtRequest, CourtResponse, DistrictRecord, Error, Result, MAX_DATAGRAM};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::info;

/// Fetch the directory. The Court excludes the caller's source address,
/// which for this ephemeral socket never matches a registered district, so
/// the full directory comes back, this district's own row included.
pub async fn fetch_districts(court_addr: &str, deadline: Duration) -> Result<Vec<DistrictRecord>> {
    let resp: CourtResponse =
        judiciary_net::request(court_addr, &CourtRequest::List, deadline).await?;
    if !resp.success {
        return Err(Error::refused(court_addr, resp.message));
    }
    Ok(resp.districts.unwrap_or_default())
}

/// Tell the Court how many trials this district now has.
pub async fn update_trials(
    court_addr: &str,
    name: &str,
    trials: u32,
    deadline: Duration,
) -> Result<()> {
    let req = CourtRequest::UpdateTrials {
        name: name.to_string(),
        trials,
    };
    let resp: CourtResponse = judiciary_net::request(court_addr, &req, deadline).await?;
    if !resp.success {
        return Err(Error::refused(court_addr, resp.message));
    }
    Ok(())
}

/// Register this district, sending from its already-bound server socket so
/// the Court records the listening address rather than an ephemeral port.
/// Must run before the serve loop takes over the socket.
pub async fn register(
    socket: &UdpSocket,
    court_addr: &str,
    name: &str,
    trials: u32,
    deadline: Duration,
) -> Result<DistrictRecord> {
    let req = CourtRequest::Create {
        name: name.to_string(),
        trials,
    };
    let payload = serde_json::to_vec(&req)?;
    socket.send_to(&payload, court_addr).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let n = match timeout(deadline, socket.recv_from(&mut buf)).await {
        Ok(Ok((n, _))) => n,
        Ok(Err(e)) => return Err(Error::Io(e)),
        Err(_) => {
            return Err(Error::Timeout {
                addr: court_addr.to_string(),
            })
        }
    };

    let resp: CourtResponse = serde_json::from_slice(&buf[..n])?;
    if !resp.success {
        return Err(Error::refused(court_addr, resp.message));
    }
    let record = resp
        .district
        .ok_or_else(|| Error::transport("court returned no district record"))?;
    info!(district_id = record.id, name = %record.name, "registered with the court");
    Ok(record)
}
