use hickory_proto::op::Message;
use sieve_dns_domain::DomainError;
use tracing::debug;

pub struct ResponseParser;

impl ResponseParser {
    /// Decodes an upstream reply and checks it answers the request with
    /// `expected_id`.
    pub fn parse(response_bytes: &[u8], expected_id: u16) -> Result<Message, DomainError> {
        let message = Message::from_vec(response_bytes).map_err(|e| {
            DomainError::InvalidDnsResponse(format!("Failed to parse DNS response: {}", e))
        })?;

        if message.id() != expected_id {
            return Err(DomainError::InvalidDnsResponse(format!(
                "Response ID {} does not match query ID {}",
                message.id(),
                expected_id
            )));
        }

        debug!(
            rcode = ?message.response_code(),
            answers = message.answers().len(),
            truncated = message.truncated(),
            "DNS response parsed"
        );

        Ok(message)
    }

    /// Smallest TTL across the answer section.
    pub fn min_answer_ttl(message: &Message) -> Option<u32> {
        message.answers().iter().map(|record| record.ttl()).min()
    }
}
