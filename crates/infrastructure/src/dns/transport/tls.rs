//! TLS Transport for DNS queries, DNS-over-TLS (RFC 7858)
//!
//! Each caller owns the `TlsConnector` it was built with. The stream (direct
//! or tunnelled through SOCKS5) lives for a single exchange.

use hickory_proto::op::Message;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error as RustlsError, SignatureScheme};
use sieve_dns_application::ports::CallError;
use sieve_dns_domain::DomainError;
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::socks5::Socks5Dialer;
use super::tcp::{exchange_framed, open_stream};
use crate::dns::forwarding::{MessageBuilder, ResponseParser};

pub struct TlsCaller {
    addr: Arc<str>,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    proxy: Option<Arc<Socks5Dialer>>,
    timeout: Duration,
}

impl TlsCaller {
    pub fn new(
        addr: Arc<str>,
        server_name: &str,
        skip_verify: bool,
        proxy: Option<Arc<Socks5Dialer>>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let server_name = ServerName::try_from(server_name.to_string()).map_err(|e| {
            DomainError::ConfigError(format!("Invalid TLS server name '{}': {}", server_name, e))
        })?;

        Ok(Self {
            addr,
            server_name,
            connector: TlsConnector::from(Arc::new(create_tls_config(skip_verify))),
            proxy,
            timeout,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn call(&self, request: &Message) -> Result<Message, CallError> {
        let message_bytes = MessageBuilder::serialize(request)?;
        let tcp_stream = open_stream(&self.addr, self.proxy.as_deref(), self.timeout).await?;

        let mut tls_stream = tokio::time::timeout(
            self.timeout,
            self.connector.connect(self.server_name.clone(), tcp_stream),
        )
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: self.addr.to_string(),
        })?
        .map_err(|e| {
            DomainError::Transport(format!("TLS handshake failed with {}: {}", self.addr, e))
        })?;

        debug!(server = %self.addr, server_name = ?self.server_name, "TLS connection established");

        let response_bytes =
            exchange_framed(&mut tls_stream, &message_bytes, &self.addr, self.timeout).await?;

        debug!(
            server = %self.addr,
            response_len = response_bytes.len(),
            "TLS response received"
        );

        Ok(ResponseParser::parse(&response_bytes, request.id())?)
    }
}

fn create_tls_config(skip_verify: bool) -> ClientConfig {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    if skip_verify {
        return ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureServerCertVerifier))
            .with_no_client_auth();
    }

    let root_store = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Accepts any server certificate. Only installed when the group sets
/// `dot_skip_verify`.
#[derive(Debug)]
struct InsecureServerCertVerifier;

impl ServerCertVerifier for InsecureServerCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
