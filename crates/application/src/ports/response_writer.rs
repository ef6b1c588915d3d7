use async_trait::async_trait;
use hickory_proto::op::Message;
use sieve_dns_domain::DomainError;

/// Sink for the reply to one request. Dropping the writer closes it.
#[async_trait]
pub trait ResponseWriter: Send {
    async fn write(&mut self, response: &Message) -> Result<(), DomainError>;
}
