use crate::dns::forwarding::MessageBuilder;
use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType};
use sieve_dns_application::ports::ResponseWriter;
use sieve_dns_application::use_cases::{HandleDnsQueryUseCase, QueryOutcome};
use sieve_dns_domain::DomainError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Sends the reply to one request back to the client that asked.
pub struct UdpResponseWriter {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpResponseWriter {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait]
impl ResponseWriter for UdpResponseWriter {
    async fn write(&mut self, response: &Message) -> Result<(), DomainError> {
        let bytes = MessageBuilder::serialize(response)?;
        self.socket
            .send_to(&bytes, self.peer)
            .await
            .map_err(|e| DomainError::IoError(format!("Failed to reply to {}: {}", self.peer, e)))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct DnsServerHandler {
    use_case: Arc<HandleDnsQueryUseCase>,
}

impl DnsServerHandler {
    pub fn new(use_case: Arc<HandleDnsQueryUseCase>) -> Self {
        Self { use_case }
    }

    /// Decodes one inbound datagram and runs it through the query handler.
    /// Requests that cannot be answered get no reply.
    pub async fn handle_datagram(
        &self,
        bytes: &[u8],
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
    ) -> Option<QueryOutcome> {
        let request = match Message::from_vec(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!(client = %peer, error = %e, "Dropping undecodable datagram");
                return None;
            }
        };

        if request.message_type() != MessageType::Query {
            debug!(client = %peer, id = request.id(), "Dropping non-query message");
            return None;
        }

        let writer = UdpResponseWriter::new(socket, peer);
        match self.use_case.execute(&request, writer).await {
            Ok(outcome) => {
                debug!(client = %peer, id = request.id(), outcome = ?outcome, "Request handled");
                Some(outcome)
            }
            Err(e) if e.is_invalid_request() => {
                debug!(client = %peer, error = %e, "Invalid request");
                None
            }
            Err(e) => {
                warn!(client = %peer, id = request.id(), error = %e, "Request not answered");
                None
            }
        }
    }
}
