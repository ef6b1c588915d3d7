use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::domain_name::normalize_domain;

/// Group used for domains nobody claims, and for classifier matches that are
/// not blocked.
pub const CLEAN_GROUP: &str = "clean";

/// Group used for classifier matches that are blocked.
pub const DIRTY_GROUP: &str = "dirty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub group: Arc<str>,
    pub reason: String,
}

impl RoutingDecision {
    pub fn new(group: impl Into<Arc<str>>, reason: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group '{}' ({})", self.group, self.reason)
    }
}

/// One row of the static suffix table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SuffixRule {
    pub suffix: String,
    pub group: String,
}

impl SuffixRule {
    pub fn new(suffix: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            group: group.into(),
        }
    }

    /// Suffix in the same canonical form the router compares domains in.
    pub fn normalized_suffix(&self) -> String {
        normalize_domain(&self.suffix)
    }
}
