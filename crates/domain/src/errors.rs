use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid DNS record: {0}")]
    InvalidRecord(String),

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport timeout talking to {server}")]
    TransportTimeout { server: String },

    #[error("Truncated response from {server}")]
    Truncated { server: String },

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("All upstream servers of group '{0}' failed")]
    AllUpstreamsFailed(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Recursive query detected: {0}")]
    RecursiveQuery(String),

    #[error("Address set '{set}' rejected {address}: {reason}")]
    AddressSet {
        set: String,
        address: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Errors raised before any network I/O took place.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}
