use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::upstream::UpstreamEndpoint;

/// Where a group's resolved IPv4 addresses are written.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressSetBackend {
    /// Kernel set managed through the `ipset` command.
    #[default]
    Ipset,

    /// Userspace set kept inside the process.
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GroupConfig {
    /// SOCKS5 proxy (`host:port`) every upstream of the group is reached through.
    #[serde(default)]
    pub socks5: Option<String>,

    #[serde(default)]
    pub ipset: Option<String>,

    /// Seconds; 0 keeps the set's own default timeout.
    #[serde(default)]
    pub ipset_ttl: u32,

    #[serde(default)]
    pub ipset_backend: AddressSetBackend,

    /// Plain DNS servers, `ADDR[:PORT][/tcp]`.
    #[serde(default)]
    pub dns: Vec<String>,

    /// DNS-over-TLS servers, `ADDR[:PORT]@SERVER_NAME`.
    #[serde(default)]
    pub dot: Vec<String>,

    #[serde(default)]
    pub dot_skip_verify: bool,

    /// DNS-over-HTTPS URLs, `https://HOST/dns-query`.
    #[serde(default)]
    pub doh: Vec<String>,

    /// Adblock-style rules claiming domains for this group.
    #[serde(default)]
    pub rules: Vec<String>,
}

impl GroupConfig {
    /// Every configured upstream in dispatch order (plain DNS, then DoT, then
    /// DoH), each either parsed or rejected.
    pub fn endpoints(&self) -> Vec<Result<UpstreamEndpoint, DomainError>> {
        let plain = self.dns.iter().map(|s| UpstreamEndpoint::parse_plain(s));
        let dot = self
            .dot
            .iter()
            .map(|s| UpstreamEndpoint::parse_dot(s, self.dot_skip_verify));
        let doh = self.doh.iter().map(|s| UpstreamEndpoint::parse_doh(s));
        plain.chain(dot).chain(doh).collect()
    }

    pub fn valid_endpoints(&self) -> Vec<UpstreamEndpoint> {
        self.endpoints().into_iter().filter_map(Result::ok).collect()
    }

    pub fn has_rules(&self) -> bool {
        self.rules.iter().any(|rule| !rule.trim().is_empty())
    }

    pub fn address_set_ttl(&self) -> Option<u32> {
        (self.ipset_ttl > 0).then_some(self.ipset_ttl)
    }
}
