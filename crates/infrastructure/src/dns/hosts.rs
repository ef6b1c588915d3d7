use hickory_proto::rr::RecordType;
use rustc_hash::FxHashMap;
use sieve_dns_application::ports::HostsSource;
use sieve_dns_domain::DomainError;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// TTL, in seconds, of records answered from hosts entries.
pub const HOSTS_RECORD_TTL: u32 = 60;

/// Static name -> addresses table answering A and AAAA questions.
#[derive(Debug, Default)]
pub struct HostsTable {
    entries: FxHashMap<String, Vec<IpAddr>>,
}

impl HostsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from inline `hostname -> ip` entries. Unparsable
    /// addresses are skipped with a warning.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut table = Self::new();
        for (name, ip) in map {
            match ip.trim().parse::<IpAddr>() {
                Ok(ip) => table.insert(name, ip),
                Err(_) => warn!(host = %name, ip = %ip, "Skipping hosts entry with invalid IP"),
            }
        }
        table
    }

    /// Parses hosts-file text: `<ip> <name> [<name>...]` per line, `#` starts
    /// a comment.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        for line in text.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let mut fields = line.split_whitespace();
            let Some(addr) = fields.next() else {
                continue;
            };
            let Ok(ip) = addr.parse::<IpAddr>() else {
                debug!(line = %line, "Skipping hosts line with invalid IP");
                continue;
            };
            for name in fields {
                table.insert(name, ip);
            }
        }
        table
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomainError::IoError(format!("Failed to read hosts file {}: {}", path.display(), e))
        })?;
        let table = Self::parse(&text);
        info!(path = %path.display(), names = table.len(), "Hosts file loaded");
        Ok(table)
    }

    pub fn insert(&mut self, name: &str, ip: IpAddr) {
        let key = normalize(name);
        if key.is_empty() {
            return;
        }
        let addrs = self.entries.entry(key).or_default();
        if !addrs.contains(&ip) {
            addrs.push(ip);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, domain: &str, record_type: RecordType) -> Option<IpAddr> {
        let addrs = self.entries.get(&normalize(domain))?;
        addrs.iter().copied().find(|ip| match record_type {
            RecordType::A => ip.is_ipv4(),
            RecordType::AAAA => ip.is_ipv6(),
            _ => false,
        })
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl HostsSource for HostsTable {
    fn gen_record(&self, domain: &str, record_type: RecordType) -> Option<String> {
        let ip = self.lookup(domain, record_type)?;
        Some(format!(
            "{} {} IN {} {}",
            domain, HOSTS_RECORD_TTL, record_type, ip
        ))
    }
}
