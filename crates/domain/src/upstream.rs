use fancy_regex::Regex;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, LazyLock};

use crate::errors::DomainError;

pub const DEFAULT_DNS_PORT: u16 = 53;
pub const DEFAULT_DOT_PORT: u16 = 853;

/// Marker appended to a plain DNS address to select TCP instead of UDP.
const TCP_SUFFIX: &str = "/tcp";

static DOH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://.+/dns-query$").expect("DoH URL pattern is a valid regex")
});

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?=.{1,253}\.?$)[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.?$",
    )
    .expect("hostname pattern is a valid regex")
});

/// A validated upstream server, as configured for one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamEndpoint {
    Udp {
        addr: Arc<str>,
    },
    Tcp {
        addr: Arc<str>,
    },
    Tls {
        addr: Arc<str>,
        server_name: Arc<str>,
        skip_verify: bool,
    },
    Https {
        url: Arc<str>,
    },
}

impl UpstreamEndpoint {
    /// Parses a plain DNS address: `ip`, `ip:port`, `host:port`, optionally
    /// suffixed with `/tcp`.
    pub fn parse_plain(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        let (addr, use_tcp) = match s.strip_suffix(TCP_SUFFIX) {
            Some(stripped) => (stripped, true),
            None => (s, false),
        };
        if addr.is_empty() {
            return Err(DomainError::ConfigError(format!(
                "Empty DNS server address '{}'",
                s
            )));
        }

        let addr: Arc<str> = with_default_port(addr, DEFAULT_DNS_PORT).into();
        if use_tcp {
            Ok(Self::Tcp { addr })
        } else {
            Ok(Self::Udp { addr })
        }
    }

    /// Parses a DNS-over-TLS server written as `addr@server_name`.
    pub fn parse_dot(s: &str, skip_verify: bool) -> Result<Self, DomainError> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('@').collect();
        let [addr, server_name] = parts.as_slice() else {
            return Err(DomainError::ConfigError(format!(
                "Invalid DoT server '{}'. Expected 'ADDR@SERVER_NAME'",
                s
            )));
        };
        if addr.is_empty() {
            return Err(DomainError::ConfigError(format!(
                "Empty DoT server address in '{}'",
                s
            )));
        }
        if server_name.is_empty() {
            return Err(DomainError::ConfigError(format!(
                "DoT server '{}' needs a TLS server name",
                s
            )));
        }
        if !is_valid_server_name(server_name) {
            return Err(DomainError::ConfigError(format!(
                "Invalid TLS server name '{}' in DoT server '{}'",
                server_name, s
            )));
        }

        Ok(Self::Tls {
            addr: with_default_port(addr, DEFAULT_DOT_PORT).into(),
            server_name: (*server_name).into(),
            skip_verify,
        })
    }

    /// Parses a DNS-over-HTTPS URL; only `https://<host>/.../dns-query` is accepted.
    pub fn parse_doh(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        if !is_valid_doh_url(s) {
            return Err(DomainError::ConfigError(format!(
                "Invalid DoH URL '{}'. Expected 'https://HOST/dns-query'",
                s
            )));
        }
        Ok(Self::Https { url: s.into() })
    }

    /// Address or URL the endpoint talks to.
    pub fn target(&self) -> &str {
        match self {
            Self::Udp { addr } | Self::Tcp { addr } | Self::Tls { addr, .. } => addr,
            Self::Https { url } => url,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp { .. } => "UDP",
            Self::Tcp { .. } => "TCP",
            Self::Tls { .. } => "TLS",
            Self::Https { .. } => "HTTPS",
        }
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp { addr } => write!(f, "udp://{}", addr),
            Self::Tcp { addr } => write!(f, "tcp://{}", addr),
            Self::Tls {
                addr, server_name, ..
            } => write!(f, "tls://{}@{}", addr, server_name),
            Self::Https { url } => write!(f, "{}", url),
        }
    }
}

pub fn is_valid_doh_url(url: &str) -> bool {
    DOH_URL.is_match(url).unwrap_or(false)
}

/// A TLS server name is a DNS hostname or an IP literal.
pub fn is_valid_server_name(name: &str) -> bool {
    name.parse::<IpAddr>().is_ok() || HOSTNAME.is_match(name).unwrap_or(false)
}

fn parse_host_port(s: &str) -> Option<(&str, u16)> {
    if s.starts_with('[') {
        let end = s.find(']')?;
        let host = &s[1..end];
        let rest = &s[end + 1..];
        let port_str = rest.strip_prefix(':')?;
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    } else {
        let (host, port_str) = s.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    }
}

/// Appends `default_port` when `addr` carries none. Bare IPv6 addresses are
/// bracketed.
pub fn with_default_port(addr: &str, default_port: u16) -> String {
    if addr.parse::<SocketAddr>().is_ok() {
        return addr.to_string();
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return SocketAddr::new(ip, default_port).to_string();
    }
    if let Some(ip) = addr
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse::<IpAddr>().ok())
    {
        return SocketAddr::new(ip, default_port).to_string();
    }
    if parse_host_port(addr).is_some() {
        return addr.to_string();
    }
    format!("{}:{}", addr, default_port)
}
