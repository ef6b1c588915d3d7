use async_trait::async_trait;
use dashmap::DashMap;
use sieve_dns_application::ports::AddressSet;
use sieve_dns_domain::DomainError;
use std::net::Ipv4Addr;
use std::process::Output;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

const IPSET_BIN: &str = "ipset";

/// Kernel `hash:ip` set driven through the `ipset` command.
pub struct IpsetAddressSet {
    name: String,
}

impl IpsetAddressSet {
    /// Creates the set when missing, with per-entry timeouts enabled.
    pub async fn create(name: &str) -> Result<Self, DomainError> {
        let output = run_ipset(&["create", name, "hash:ip", "timeout", "0", "-exist"])
            .await
            .map_err(|e| set_error(name, "-", e))?;
        check_status(name, "-", &output)?;

        info!(set = %name, "ipset ready");
        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Wraps an existing set without touching the kernel.
    pub fn existing(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl AddressSet for IpsetAddressSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, addr: Ipv4Addr, ttl: u32) -> Result<(), DomainError> {
        let ip = addr.to_string();
        let ttl_arg = ttl.to_string();
        let mut args = vec!["add", self.name.as_str(), ip.as_str()];
        if ttl > 0 {
            args.extend(["timeout", ttl_arg.as_str()]);
        }
        args.push("-exist");

        let output = run_ipset(&args)
            .await
            .map_err(|e| set_error(&self.name, &ip, e))?;
        check_status(&self.name, &ip, &output)?;

        debug!(set = %self.name, address = %ip, ttl = ttl, "Address added to ipset");
        Ok(())
    }
}

async fn run_ipset(args: &[&str]) -> std::io::Result<Output> {
    Command::new(IPSET_BIN).args(args).output().await
}

fn check_status(set: &str, address: &str, output: &Output) -> Result<(), DomainError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(set_error(set, address, stderr.trim()))
}

fn set_error(set: &str, address: &str, reason: impl ToString) -> DomainError {
    DomainError::AddressSet {
        set: set.to_string(),
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

/// In-process address set with per-entry expiry.
pub struct MemoryAddressSet {
    name: String,
    default_ttl: Option<Duration>,
    /// Expiry per address; `None` never expires.
    entries: DashMap<Ipv4Addr, Option<Instant>>,
}

impl MemoryAddressSet {
    /// `default_ttl` applies to entries added with a ttl of 0; `None` keeps
    /// them forever.
    pub fn new(name: &str, default_ttl: Option<Duration>) -> Self {
        Self {
            name: name.to_string(),
            default_ttl,
            entries: DashMap::new(),
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let now = Instant::now();
        let live = match self.entries.get(&addr) {
            Some(entry) => entry.value().map_or(true, |expires_at| now < expires_at),
            None => return false,
        };
        if !live {
            self.entries.remove_if(&addr, |_, expires_at| {
                expires_at.is_some_and(|at| now >= at)
            });
        }
        live
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().map_or(true, |at| now < at))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, expires_at| expires_at.map_or(true, |at| now < at));
    }
}

#[async_trait]
impl AddressSet for MemoryAddressSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, addr: Ipv4Addr, ttl: u32) -> Result<(), DomainError> {
        let ttl = match ttl {
            0 => self.default_ttl,
            secs => Some(Duration::from_secs(u64::from(secs))),
        };
        self.entries.insert(addr, ttl.map(|ttl| Instant::now() + ttl));
        debug!(set = %self.name, address = %addr, "Address added to memory set");
        Ok(())
    }
}
