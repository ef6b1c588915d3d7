pub mod https;
pub mod socks5;
pub mod tcp;
pub mod tls;
pub mod udp;

use async_trait::async_trait;
use hickory_proto::op::Message;
use sieve_dns_application::ports::{CallError, DnsCaller};
use sieve_dns_domain::{DomainError, UpstreamEndpoint};
use std::sync::Arc;
use std::time::Duration;

pub use socks5::Socks5Dialer;

/// One upstream server reachable over a fixed protocol.
pub enum Caller {
    Udp(udp::UdpCaller),
    Tcp(tcp::TcpCaller),
    Tls(tls::TlsCaller),
    Https(https::HttpsCaller),
}

impl Caller {
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(_) => "UDP",
            Self::Tcp(_) => "TCP",
            Self::Tls(_) => "TLS",
            Self::Https(_) => "HTTPS",
        }
    }
}

#[async_trait]
impl DnsCaller for Caller {
    async fn call(&self, request: &Message) -> Result<Message, CallError> {
        validate_request(request, self.upstream())?;

        match self {
            Self::Udp(c) => c.call(request).await,
            Self::Tcp(c) => c.call(request).await,
            Self::Tls(c) => c.call(request).await,
            Self::Https(c) => c.call(request).await,
        }
    }

    fn upstream(&self) -> &str {
        match self {
            Self::Udp(c) => c.addr(),
            Self::Tcp(c) => c.addr(),
            Self::Tls(c) => c.addr(),
            Self::Https(c) => c.url(),
        }
    }
}

/// Rejects requests no upstream could answer, before any I/O.
fn validate_request(request: &Message, target: &str) -> Result<(), DomainError> {
    if request.queries().is_empty() {
        return Err(DomainError::InvalidRequest(
            "DNS request carries no question".to_string(),
        ));
    }
    if target.is_empty() {
        return Err(DomainError::InvalidRequest(
            "Upstream address is empty".to_string(),
        ));
    }
    Ok(())
}

pub fn create_caller(
    endpoint: &UpstreamEndpoint,
    proxy: Option<Arc<Socks5Dialer>>,
    timeout: Duration,
) -> Result<Caller, DomainError> {
    match endpoint {
        UpstreamEndpoint::Udp { addr } => Ok(Caller::Udp(udp::UdpCaller::new(
            Arc::clone(addr),
            proxy,
            timeout,
        ))),
        UpstreamEndpoint::Tcp { addr } => Ok(Caller::Tcp(tcp::TcpCaller::new(
            Arc::clone(addr),
            proxy,
            timeout,
        ))),
        UpstreamEndpoint::Tls {
            addr,
            server_name,
            skip_verify,
        } => Ok(Caller::Tls(tls::TlsCaller::new(
            Arc::clone(addr),
            server_name,
            *skip_verify,
            proxy,
            timeout,
        )?)),
        UpstreamEndpoint::Https { url } => Ok(Caller::Https(https::HttpsCaller::new(
            Arc::clone(url),
            proxy.as_deref(),
            timeout,
        )?)),
    }
}
