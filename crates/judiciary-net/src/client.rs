//! One-shot datagram RPC: send a JSON request, wait for one JSON reply
//!
//! Each call binds an ephemeral socket, sends a single datagram, and waits
//! for the reply under a read deadline. A timeout aborts only this exchange;
//! the caller decides what "no answer" means for it.

use judiciary_core::{Error, Result, MAX_DATAGRAM};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

/// Send `req` to `addr` and decode the single reply datagram as `Resp`.
pub async fn request<Req, Resp>(addr: &str, req: &Req, deadline: Duration) -> Result<Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_vec(req)?;
    if payload.len() > MAX_DATAGRAM {
        return Err(Error::PayloadTooLarge(payload.len()));
    }

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket
        .connect(addr)
        .await
        .map_err(|e| Error::transport(format!("cannot reach {addr}: {e}")))?;

    debug!(peer = addr, bytes = payload.len(), "sending request");
    socket.send(&payload).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let n = match timeout(deadline, socket.recv(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(Error::Io(e)),
        Err(_) => {
            return Err(Error::Timeout {
                addr: addr.to_string(),
            })
        }
    };

    debug!(peer = addr, bytes = n, "received reply");
    Ok(serde_json::from_slice(&buf[..n])?)
}
