use hickory_proto::op::{Message, Query};
use hickory_proto::rr::Record;

#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit(Message),
    /// Every upstream failed recently for this question.
    Negative,
    Miss,
}

impl CacheLookup {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Response cache keyed by question plus the extra records of the request,
/// its EDNS section included as an OPT record.
pub trait ResponseCache: Send + Sync {
    fn get(&self, query: &Query, extra: &[Record]) -> CacheLookup;

    /// `None` records a negative entry.
    fn set(&self, query: &Query, extra: &[Record], response: Option<&Message>);
}
