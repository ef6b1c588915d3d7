//! HTTPS Transport for DNS queries, DNS-over-HTTPS (RFC 8484)
//!
//! Wire format (HTTP):
//! ```text
//! POST /dns-query HTTP/2
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```
//!
//! Every caller builds its own `reqwest::Client`; a group proxy is set on
//! that client only.

use hickory_proto::op::Message;
use sieve_dns_application::ports::CallError;
use sieve_dns_domain::DomainError;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::socks5::Socks5Dialer;
use crate::dns::forwarding::{MessageBuilder, ResponseParser};

/// Content type for DNS-over-HTTPS requests and responses (RFC 8484 §4.2.1)
const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct HttpsCaller {
    url: Arc<str>,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpsCaller {
    pub fn new(
        url: Arc<str>,
        proxy: Option<&Socks5Dialer>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .pool_max_idle_per_host(4);

        if let Some(dialer) = proxy {
            let proxy_url = format!("socks5h://{}", dialer.proxy_addr());
            let proxy = reqwest::Proxy::all(&proxy_url).map_err(|e| {
                DomainError::ConfigError(format!("Invalid SOCKS5 proxy '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            DomainError::ConfigError(format!("Failed to build HTTP client for {}: {}", url, e))
        })?;

        Ok(Self::with_client(url, client, timeout))
    }

    /// Uses a caller-supplied client, e.g. one trusting a private CA.
    pub fn with_client(url: Arc<str>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            url,
            client,
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call(&self, request: &Message) -> Result<Message, CallError> {
        let message_bytes = MessageBuilder::serialize(request)?;

        debug!(
            url = %self.url,
            message_len = message_bytes.len(),
            "Sending DoH query"
        );

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&*self.url)
                .header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
                .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                .body(message_bytes)
                .send(),
        )
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: self.url.to_string(),
        })?
        .map_err(|e| DomainError::Transport(format!("DoH request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Transport(format!(
                "DoH server {} returned HTTP {}: {}",
                self.url,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ))
            .into());
        }

        let response_bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.url.to_string(),
            })?
            .map_err(|e| {
                DomainError::Transport(format!(
                    "Failed to read DoH response from {}: {}",
                    self.url, e
                ))
            })?;

        debug!(
            url = %self.url,
            response_len = response_bytes.len(),
            "DoH response received"
        );

        Ok(ResponseParser::parse(&response_bytes, request.id())?)
    }
}
