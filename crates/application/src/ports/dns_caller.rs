use async_trait::async_trait;
use hickory_proto::op::Message;
use sieve_dns_domain::DomainError;
use std::fmt;

/// Failure of one upstream exchange. A reply that did arrive but is not
/// usable as-is (a truncated UDP answer) travels along as `partial`.
#[derive(Debug)]
pub struct CallError {
    pub error: DomainError,
    pub partial: Option<Box<Message>>,
}

impl CallError {
    pub fn new(error: DomainError) -> Self {
        Self {
            error,
            partial: None,
        }
    }

    pub fn with_partial(error: DomainError, partial: Message) -> Self {
        Self {
            error,
            partial: Some(Box::new(partial)),
        }
    }
}

impl From<DomainError> for CallError {
    fn from(error: DomainError) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.partial.is_some() {
            write!(f, "{} (partial response available)", self.error)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl std::error::Error for CallError {}

/// One query/response exchange with a single upstream server.
#[async_trait]
pub trait DnsCaller: Send + Sync {
    async fn call(&self, request: &Message) -> Result<Message, CallError>;

    /// Upstream address or URL, for logs.
    fn upstream(&self) -> &str;
}
