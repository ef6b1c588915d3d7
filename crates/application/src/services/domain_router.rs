use sieve_dns_domain::{normalize_domain, RoutingDecision, SuffixRule, CLEAN_GROUP, DIRTY_GROUP};
use std::sync::Arc;
use tracing::debug;

use crate::ports::Classifier;

struct SuffixEntry {
    matcher: String,
    /// Names the suffix as configured.
    reason: String,
    group: Arc<str>,
}

/// Maps a domain name onto the group whose upstreams should answer it.
///
/// Resolution order:
/// 1. Static suffix table, first match in configured order
/// 2. Per-group rule lists, in the order they were registered
/// 3. Global classifier (blocked -> dirty, matched -> clean)
/// 4. `clean` by default
pub struct DomainRouter {
    suffixes: Vec<SuffixEntry>,
    group_rules: Vec<(Arc<str>, Arc<dyn Classifier>)>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl DomainRouter {
    pub fn new(suffixes: &[SuffixRule], classifier: Option<Arc<dyn Classifier>>) -> Self {
        let suffixes = suffixes
            .iter()
            .map(|rule| SuffixEntry {
                matcher: rule.normalized_suffix(),
                reason: format!("suffix {}", rule.suffix),
                group: Arc::from(rule.group.as_str()),
            })
            .filter(|entry| !entry.matcher.is_empty())
            .collect();

        Self {
            suffixes,
            group_rules: Vec::new(),
            classifier,
        }
    }

    pub fn with_group_rules(
        mut self,
        group: impl Into<Arc<str>>,
        rules: Arc<dyn Classifier>,
    ) -> Self {
        self.group_rules.push((group.into(), rules));
        self
    }

    pub fn resolve(&self, domain: &str) -> RoutingDecision {
        let domain = normalize_domain(domain);

        for entry in &self.suffixes {
            if domain.ends_with(entry.matcher.as_str()) {
                return RoutingDecision::new(Arc::clone(&entry.group), entry.reason.clone());
            }
        }

        for (group, rules) in &self.group_rules {
            if rules.is_blocked(&domain) == Some(true) {
                return RoutingDecision::new(Arc::clone(group), "rules");
            }
        }

        if let Some(classifier) = &self.classifier {
            match classifier.is_blocked(&domain) {
                Some(true) => return RoutingDecision::new(DIRTY_GROUP, "classifier"),
                Some(false) => return RoutingDecision::new(CLEAN_GROUP, "classifier"),
                None => debug!(domain = %domain, "No classifier rule matched"),
            }
        }

        RoutingDecision::new(CLEAN_GROUP, "default")
    }
}
