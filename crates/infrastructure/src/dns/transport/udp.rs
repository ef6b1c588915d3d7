//! UDP Transport for DNS queries (RFC 1035 §4.2.1)
//!
//! Messages are sent as-is (no framing). A reply with the TC bit set is
//! handed back as a partial response. With a SOCKS5 proxy the exchange runs
//! over a tunnelled TCP stream instead, since the proxy only offers CONNECT.

use hickory_proto::op::Message;
use sieve_dns_application::ports::CallError;
use sieve_dns_domain::DomainError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use super::socks5::Socks5Dialer;
use super::tcp::exchange_framed;
use crate::dns::forwarding::{MessageBuilder, ResponseParser};

/// Maximum UDP DNS response size with EDNS(0)
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub struct UdpCaller {
    addr: Arc<str>,
    proxy: Option<Arc<Socks5Dialer>>,
    timeout: Duration,
}

impl UdpCaller {
    pub fn new(addr: Arc<str>, proxy: Option<Arc<Socks5Dialer>>, timeout: Duration) -> Self {
        Self {
            addr,
            proxy,
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn call(&self, request: &Message) -> Result<Message, CallError> {
        let message_bytes = MessageBuilder::serialize(request)?;

        if let Some(dialer) = &self.proxy {
            let mut stream = dialer.connect(&self.addr).await?;
            let response_bytes =
                exchange_framed(&mut stream, &message_bytes, &self.addr, self.timeout).await?;
            debug!(server = %self.addr, proxy = %dialer.proxy_addr(), "Proxied UDP query answered");
            return Ok(ResponseParser::parse(&response_bytes, request.id())?);
        }

        let response_bytes = self.exchange_direct(&message_bytes).await?;
        let response = ResponseParser::parse(&response_bytes, request.id())?;

        if response.truncated() {
            return Err(CallError::with_partial(
                DomainError::Truncated {
                    server: self.addr.to_string(),
                },
                response,
            ));
        }

        Ok(response)
    }

    async fn exchange_direct(&self, message_bytes: &[u8]) -> Result<Vec<u8>, DomainError> {
        let server_addr = self.resolve().await?;
        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| DomainError::Transport(format!("Failed to bind UDP socket: {}", e)))?;
        socket.connect(server_addr).await.map_err(|e| {
            DomainError::Transport(format!("Failed to connect UDP socket to {}: {}", server_addr, e))
        })?;

        let bytes_sent = tokio::time::timeout(self.timeout, socket.send(message_bytes))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.addr.to_string(),
            })?
            .map_err(|e| {
                DomainError::Transport(format!("Failed to send UDP query to {}: {}", server_addr, e))
            })?;

        debug!(server = %server_addr, bytes_sent, "UDP query sent");

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let bytes_received = tokio::time::timeout(self.timeout, socket.recv(&mut recv_buf))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.addr.to_string(),
            })?
            .map_err(|e| {
                DomainError::Transport(format!(
                    "Failed to receive UDP response from {}: {}",
                    server_addr, e
                ))
            })?;

        recv_buf.truncate(bytes_received);
        debug!(server = %server_addr, bytes_received, "UDP response received");
        Ok(recv_buf)
    }

    async fn resolve(&self) -> Result<SocketAddr, DomainError> {
        if let Ok(addr) = self.addr.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::time::timeout(self.timeout, tokio::net::lookup_host(&*self.addr))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.addr.to_string(),
            })?
            .map_err(|e| {
                DomainError::Transport(format!("Failed to resolve {}: {}", self.addr, e))
            })?;

        addrs.next().ok_or_else(|| {
            warn!(server = %self.addr, "Upstream name resolved to no address");
            DomainError::Transport(format!("No address found for {}", self.addr))
        })
    }
}
