//! UDP DNS Server
//!
//! Receives datagrams and answers each one on its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::dns::SeedDnsHandler;

/// Largest request datagram we read
const DNS_MAX_PACKET_SIZE: usize = 4096;

/// Pause after a receive error before reading again
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// DNS server bound to a UDP socket
pub struct DnsServer {
    socket: Arc<UdpSocket>,
    handler: Arc<SeedDnsHandler>,
}

impl DnsServer {
    /// Bind the UDP socket. Failing here is fatal for the seed.
    pub async fn bind(addr: SocketAddr, handler: Arc<SeedDnsHandler>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;

        Ok(Self {
            socket: Arc::new(socket),
            handler,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve until the task is dropped
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            "🌐 DNS server listening on {} for {}",
            self.local_addr()?,
            self.handler.domain()
        );

        let mut buf = vec![0u8; DNS_MAX_PACKET_SIZE];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => {
                    let request = buf[..len].to_vec();
                    let handler = self.handler.clone();
                    let socket = self.socket.clone();

                    tokio::spawn(async move {
                        let Some(response) = handler.handle_datagram(&request) else {
                            return;
                        };
                        if let Err(e) = socket.send_to(&response, src).await {
                            debug!("DNS reply to {} failed: {}", src, e);
                        }
                    });
                }
                Err(e) => {
                    // ICMP errors from earlier replies surface here on some
                    // platforms; the socket itself is still usable.
                    error!("DNS socket error: {}", e);
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
            }
        }
    }
}
