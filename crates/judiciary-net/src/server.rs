//! Datagram serve loop — one spawned task per incoming packet
//!
//! The listener only reads; each datagram is handed to the agent's handler
//! on its own task so a slow handler never blocks the socket. Handlers
//! return the reply bytes (already JSON-encoded) or `None` when there is
//! nothing to say.

use judiciary_core::MAX_DATAGRAM;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// An agent's datagram handler. One call per packet, concurrent calls
/// expected.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        data: Vec<u8>,
        peer: SocketAddr,
    ) -> impl Future<Output = Option<Vec<u8>>> + Send;
}

/// Read datagrams off `socket` forever, dispatching each to `handler` on a
/// spawned task and unicasting the reply back to the sender.
pub async fn serve<H: Handler>(socket: Arc<UdpSocket>, handler: Arc<H>) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, peer) = socket.recv_from(&mut buf).await?;
        let data = buf[..n].to_vec();
        debug!(%peer, bytes = n, "datagram received");

        let socket = socket.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Some(reply) = handler.handle(data, peer).await {
                if reply.len() > MAX_DATAGRAM {
                    warn!(%peer, bytes = reply.len(), "reply exceeds datagram limit, dropping");
                    return;
                }
                if let Err(e) = socket.send_to(&reply, peer).await {
                    warn!(%peer, error = %e, "failed to send reply");
                }
            }
        });
    }
}
