use async_trait::async_trait;
use sieve_dns_domain::DomainError;
use std::net::Ipv4Addr;

/// External set of addresses (e.g. a kernel ipset) that resolved A records of
/// a group are written into.
#[async_trait]
pub trait AddressSet: Send + Sync {
    fn name(&self) -> &str;

    /// Adds `addr` with a timeout of `ttl` seconds; 0 keeps the set default.
    async fn add(&self, addr: Ipv4Addr, ttl: u32) -> Result<(), DomainError>;
}
