//! SOCKS5 CONNECT dialer (RFC 1928), no authentication.
//!
//! Every proxied exchange opens its own tunnel; the returned stream is owned
//! by the caller and closed when dropped.

use sieve_dns_domain::DomainError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

pub const SOCKS5_VERSION: u8 = 0x05;
pub const AUTH_METHOD_NONE: u8 = 0x00;
pub const AUTH_METHOD_NO_ACCEPTABLE: u8 = 0xFF;
pub const CMD_CONNECT: u8 = 0x01;
pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;
pub const REPLY_SUCCEEDED: u8 = 0x00;

pub const fn reply_message(code: u8) -> &'static str {
    match code {
        0x00 => "succeeded",
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

#[derive(Debug)]
pub struct Socks5Dialer {
    proxy_addr: Arc<str>,
    timeout: Duration,
}

impl Socks5Dialer {
    pub fn new(proxy_addr: impl Into<Arc<str>>, timeout: Duration) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
            timeout,
        }
    }

    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }

    /// Opens a tunnel to `target` (`host:port` or a socket address).
    pub async fn connect(&self, target: &str) -> Result<TcpStream, DomainError> {
        let request = build_connect_request(target)?;

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&*self.proxy_addr))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.proxy_addr.to_string(),
            })?
            .map_err(|e| {
                DomainError::Proxy(format!(
                    "Failed to connect to SOCKS5 proxy {}: {}",
                    self.proxy_addr, e
                ))
            })?;

        tokio::time::timeout(self.timeout, negotiate(&mut stream, &request))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.proxy_addr.to_string(),
            })??;

        debug!(proxy = %self.proxy_addr, target = %target, "SOCKS5 tunnel established");
        Ok(stream)
    }
}

/// Method selection followed by CONNECT on an already connected stream.
pub async fn negotiate<S>(stream: &mut S, connect_request: &[u8]) -> Result<(), DomainError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[SOCKS5_VERSION, 1, AUTH_METHOD_NONE])
        .await
        .map_err(|e| DomainError::Proxy(format!("write methods failed: {}", e)))?;

    let mut response = [0u8; 2];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| DomainError::Proxy(format!("read method response failed: {}", e)))?;

    if response[0] != SOCKS5_VERSION {
        return Err(DomainError::Proxy(format!(
            "invalid SOCKS version {:#04x}",
            response[0]
        )));
    }
    match response[1] {
        AUTH_METHOD_NONE => {}
        AUTH_METHOD_NO_ACCEPTABLE => {
            return Err(DomainError::Proxy(
                "proxy accepts none of the offered auth methods".to_string(),
            ))
        }
        other => {
            return Err(DomainError::Proxy(format!(
                "unsupported auth method {:#04x}",
                other
            )))
        }
    }

    stream
        .write_all(connect_request)
        .await
        .map_err(|e| DomainError::Proxy(format!("write connect request failed: {}", e)))?;

    read_connect_reply(stream).await
}

pub fn build_connect_request(target: &str) -> Result<Vec<u8>, DomainError> {
    let mut request = Vec::with_capacity(22);
    request.extend_from_slice(&[SOCKS5_VERSION, CMD_CONNECT, 0x00]);

    let port = if let Ok(addr) = target.parse::<SocketAddr>() {
        match addr.ip() {
            IpAddr::V4(v4) => {
                request.push(ATYP_IPV4);
                request.extend_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                request.push(ATYP_IPV6);
                request.extend_from_slice(&v6.octets());
            }
        }
        addr.port()
    } else {
        let (host, port) = target
            .rsplit_once(':')
            .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)))
            .ok_or_else(|| DomainError::Proxy(format!("Invalid proxy target '{}'", target)))?;
        if host.is_empty() || host.len() > u8::MAX as usize {
            return Err(DomainError::Proxy(format!(
                "Invalid proxy target host '{}'",
                host
            )));
        }
        request.push(ATYP_DOMAIN);
        request.push(host.len() as u8);
        request.extend_from_slice(host.as_bytes());
        port
    };

    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

async fn read_connect_reply<S>(stream: &mut S) -> Result<(), DomainError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| DomainError::Proxy(format!("read reply header failed: {}", e)))?;

    if header[0] != SOCKS5_VERSION {
        return Err(DomainError::Proxy(format!(
            "invalid SOCKS version {:#04x} in reply",
            header[0]
        )));
    }
    if header[1] != REPLY_SUCCEEDED {
        return Err(DomainError::Proxy(format!(
            "proxy refused CONNECT: {}",
            reply_message(header[1])
        )));
    }

    // Bound address is not used, only drained.
    let addr_len = match header[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream
                .read_exact(&mut len)
                .await
                .map_err(|e| DomainError::Proxy(format!("read domain len failed: {}", e)))?;
            len[0] as usize
        }
        other => {
            return Err(DomainError::Proxy(format!(
                "invalid address type {:#04x} in reply",
                other
            )))
        }
    };

    let mut bound = vec![0u8; addr_len + 2];
    stream
        .read_exact(&mut bound)
        .await
        .map_err(|e| DomainError::Proxy(format!("read bound address failed: {}", e)))?;

    Ok(())
}
