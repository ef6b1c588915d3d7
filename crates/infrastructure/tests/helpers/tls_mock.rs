#![allow(dead_code)]
//! Loopback DNS-over-TLS and DNS-over-HTTPS upstreams behind a freshly
//! generated self-signed certificate.

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use super::dns_server_mock::{build_mock_response, serve_framed, MockBehavior};

pub const TLS_SERVER_NAME: &str = "localhost";

fn self_signed_acceptor() -> TlsAcceptor {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let certified = rcgen::generate_simple_self_signed(vec![TLS_SERVER_NAME.to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![certified.cert.der().clone()], key)
        .unwrap();

    TlsAcceptor::from(Arc::new(config))
}

/// DoT upstream: TLS handshake, then one length-prefixed exchange.
pub struct MockDotServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockDotServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = self_signed_acceptor();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    if let Ok(tls) = acceptor.accept(stream).await {
                        serve_framed(tls, behavior, counter).await;
                    }
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockDotServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One HTTP request as the DoH upstream saw it.
#[derive(Debug, Clone, Default)]
pub struct RecordedHttpRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedHttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// DoH upstream speaking HTTP/1.1 over TLS. Answers with `status`; a 200
/// carries the DNS reply built from the posted body.
pub struct MockDohServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedHttpRequest>>>,
    task: JoinHandle<()>,
}

impl MockDohServer {
    pub async fn start(behavior: MockBehavior, status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = self_signed_acceptor();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    while let Some(request) = read_http_request(&mut tls).await {
                        let body = match status {
                            200 => build_mock_response(&request.body, behavior).unwrap_or_default(),
                            _ => Vec::new(),
                        };
                        recorded.lock().unwrap().push(request);

                        let head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: application/dns-message\r\nContent-Length: {}\r\n\r\n",
                            status,
                            if status == 200 { "OK" } else { "Error" },
                            body.len()
                        );
                        if tls.write_all(head.as_bytes()).await.is_err()
                            || tls.write_all(&body).await.is_err()
                            || tls.flush().await.is_err()
                        {
                            return;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("https://{}:{}/dns-query", TLS_SERVER_NAME, self.addr.port())
    }

    pub fn requests(&self) -> Vec<RecordedHttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockDohServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_http_request<S>(stream: &mut S) -> Option<RecordedHttpRequest>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Some(RecordedHttpRequest {
        method,
        path,
        headers,
        body,
    })
}
