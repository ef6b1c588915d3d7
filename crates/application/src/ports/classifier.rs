/// Rule-list lookup used by the router.
pub trait Classifier: Send + Sync {
    /// `None` when no rule matches the domain, otherwise whether the matching
    /// rule blocks it.
    fn is_blocked(&self, domain: &str) -> Option<bool>;
}
