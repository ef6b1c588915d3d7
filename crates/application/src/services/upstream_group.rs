use sieve_dns_domain::{DomainError, CLEAN_GROUP, DIRTY_GROUP};
use std::sync::Arc;

use crate::ports::{AddressSet, DnsCaller};

/// Named set of upstream callers plus the side effects attached to answers
/// they produce.
pub struct UpstreamGroup {
    pub name: Arc<str>,
    /// Tried strictly in order.
    pub callers: Vec<Arc<dyn DnsCaller>>,
    pub address_set: Option<Arc<dyn AddressSet>>,
    /// Seconds; 0 keeps the set default.
    pub address_set_ttl: u32,
}

impl UpstreamGroup {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            callers: Vec::new(),
            address_set: None,
            address_set_ttl: 0,
        }
    }

    pub fn with_caller(mut self, caller: Arc<dyn DnsCaller>) -> Self {
        self.callers.push(caller);
        self
    }

    pub fn with_callers(mut self, callers: impl IntoIterator<Item = Arc<dyn DnsCaller>>) -> Self {
        self.callers.extend(callers);
        self
    }

    pub fn with_address_set(mut self, set: Arc<dyn AddressSet>, ttl: u32) -> Self {
        self.address_set = Some(set);
        self.address_set_ttl = ttl;
        self
    }
}

/// Fails unless the clean and dirty groups both exist with at least one
/// caller; every unmatched domain is routed to one of them.
pub fn ensure_routable_groups(groups: &[UpstreamGroup]) -> Result<(), DomainError> {
    for required in [CLEAN_GROUP, DIRTY_GROUP] {
        match groups.iter().find(|group| &*group.name == required) {
            None => return Err(DomainError::GroupNotFound(required.to_string())),
            Some(group) if group.callers.is_empty() => {
                return Err(DomainError::ConfigError(format!(
                    "Group '{}' has no usable upstream servers",
                    required
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
