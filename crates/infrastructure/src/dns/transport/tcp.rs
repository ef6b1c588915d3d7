use hickory_proto::op::Message;
use sieve_dns_application::ports::CallError;
use sieve_dns_domain::DomainError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::socks5::Socks5Dialer;
use crate::dns::forwarding::{MessageBuilder, ResponseParser};

/// DNS over TCP (RFC 1035 §4.2.2), direct or through a SOCKS5 tunnel.
pub struct TcpCaller {
    addr: Arc<str>,
    proxy: Option<Arc<Socks5Dialer>>,
    timeout: Duration,
}

impl TcpCaller {
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
        let mut stream = open_stream(&self.addr, self.proxy.as_deref(), self.timeout).await?;

        let response_bytes =
            exchange_framed(&mut stream, &message_bytes, &self.addr, self.timeout).await?;

        debug!(
            server = %self.addr,
            response_len = response_bytes.len(),
            "TCP response received"
        );

        Ok(ResponseParser::parse(&response_bytes, request.id())?)
    }
}

/// Connects to `addr` directly, or through `proxy` when one is configured.
pub(crate) async fn open_stream(
    addr: &str,
    proxy: Option<&Socks5Dialer>,
    timeout: Duration,
) -> Result<TcpStream, DomainError> {
    if let Some(dialer) = proxy {
        return dialer.connect(addr).await;
    }

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: addr.to_string(),
        })?
        .map_err(|e| DomainError::Transport(format!("Failed to connect to {}: {}", addr, e)))?;

    stream.set_nodelay(true).map_err(|e| {
        DomainError::Transport(format!("Failed to set TCP_NODELAY on {}: {}", addr, e))
    })?;

    Ok(stream)
}

/// One length-prefixed write followed by one length-prefixed read.
pub(crate) async fn exchange_framed<S>(
    stream: &mut S,
    message_bytes: &[u8],
    server: &str,
    timeout: Duration,
) -> Result<Vec<u8>, DomainError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    tokio::time::timeout(timeout, send_with_length_prefix(stream, message_bytes))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })??;

    tokio::time::timeout(timeout, read_with_length_prefix(stream))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: server.to_string(),
        })?
}

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    message_bytes: &[u8],
) -> Result<(), DomainError>
where
    S: AsyncWriteExt + Unpin,
{
    let length = u16::try_from(message_bytes.len()).map_err(|_| {
        DomainError::InvalidRequest(format!(
            "DNS message too large for TCP framing: {} bytes",
            message_bytes.len()
        ))
    })?;

    stream
        .write_all(&length.to_be_bytes())
        .await
        .map_err(|e| DomainError::Transport(format!("Failed to write length prefix: {}", e)))?;
    stream
        .write_all(message_bytes)
        .await
        .map_err(|e| DomainError::Transport(format!("Failed to write DNS message: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DomainError::Transport(format!("Failed to flush stream: {}", e)))?;

    Ok(())
}

pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> Result<Vec<u8>, DomainError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| DomainError::Transport(format!("Failed to read response length: {}", e)))?;

    let response_len = usize::from(u16::from_be_bytes(len_buf));
    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| DomainError::Transport(format!("Failed to read response body: {}", e)))?;

    Ok(response)
}
