use sieve_dns_infrastructure::dns::DnsServerHandler;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

/// Largest datagram accepted from clients.
const MAX_DATAGRAM_SIZE: usize = 4096;

const RECV_BACKOFF_START: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);
/// Consecutive receive errors tolerated before the listener gives up.
const MAX_CONSECUTIVE_RECV_ERRORS: u32 = 50;

pub async fn start_dns_server(
    bind_addr: SocketAddr,
    handler: DnsServerHandler,
) -> anyhow::Result<()> {
    let socket = Arc::new(create_udp_socket(bind_addr)?);
    info!(bind_address = %bind_addr, "DNS server listening on UDP");

    run_udp_loop(socket, Arc::new(handler)).await
}

/// Spawns one task per datagram. Returns only when receiving keeps failing.
async fn run_udp_loop(
    socket: Arc<UdpSocket>,
    handler: Arc<DnsServerHandler>,
) -> anyhow::Result<()> {
    let mut recv_buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut backoff = RecvBackoff::default();

    loop {
        match socket.recv_from(&mut recv_buf).await {
            Ok((n, peer)) => {
                backoff.reset();
                debug!(client = %peer, bytes = n, "Datagram received");
                let query: Arc<[u8]> = Arc::from(&recv_buf[..n]);
                let handler = Arc::clone(&handler);
                let socket = Arc::clone(&socket);
                tokio::spawn(async move {
                    handler.handle_datagram(&query, socket, peer).await;
                });
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // ICMP port unreachable from a previous reply surfaces here on some platforms.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
            Err(e) => match backoff.on_error() {
                Some(delay) => {
                    error!(error = %e, retry_in_ms = delay.as_millis() as u64, "UDP recv error");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(error = %e, "UDP recv keeps failing, stopping listener");
                    return Err(anyhow::Error::new(e).context("UDP receive failed repeatedly"));
                }
            },
        }
    }
}

/// Exponential delay between failed receives, reset by any datagram.
#[derive(Debug, Default)]
struct RecvBackoff {
    failures: u32,
}

impl RecvBackoff {
    fn reset(&mut self) {
        self.failures = 0;
    }

    /// Delay before the next receive; `None` once the error budget is spent.
    fn on_error(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures > MAX_CONSECUTIVE_RECV_ERRORS {
            return None;
        }
        let factor = 1u32 << (self.failures - 1).min(16);
        Some(RECV_BACKOFF_START.saturating_mul(factor).min(RECV_BACKOFF_MAX))
    }
}

fn create_udp_socket(socket_addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(512 * 1024)?;
    socket.set_send_buffer_size(512 * 1024)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}
