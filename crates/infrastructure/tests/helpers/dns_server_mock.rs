#![allow(dead_code)]
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;

pub const MOCK_ANSWER_TTL: u32 = 60;

#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    /// One A record for the question name.
    Answer(Ipv4Addr),
    /// TC bit set, no answers.
    Truncated,
    /// Never replies.
    Silent,
}

/// In-process upstream DNS server on an ephemeral loopback port.
pub struct MockDnsServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn udp(behavior: MockBehavior) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        if let Ok((len, peer)) = result {
                            counter.fetch_add(1, Ordering::SeqCst);
                            if let Some(response) = build_mock_response(&buf[..len], behavior) {
                                let _ = socket.send_to(&response, peer).await;
                            }
                        }
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub async fn tcp(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let counter = Arc::clone(&counter);
                            tokio::spawn(serve_framed(stream, behavior, counter));
                        }
                    }
                }
            }
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Answers one length-prefixed query on `stream`.
pub async fn serve_framed<S>(mut stream: S, behavior: MockBehavior, counter: Arc<AtomicUsize>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut len_buf = [0u8; 2];
    if stream.read_exact(&mut len_buf).await.is_err() {
        return;
    }
    let mut query = vec![0u8; u16::from_be_bytes(len_buf) as usize];
    if stream.read_exact(&mut query).await.is_err() {
        return;
    }
    counter.fetch_add(1, Ordering::SeqCst);

    let Some(response) = build_mock_response(&query, behavior) else {
        // Hold the connection open without answering.
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink).await;
        return;
    };
    let mut framed = (response.len() as u16).to_be_bytes().to_vec();
    framed.extend_from_slice(&response);
    let _ = stream.write_all(&framed).await;
}

pub fn build_mock_response(query: &[u8], behavior: MockBehavior) -> Option<Vec<u8>> {
    let request = Message::from_vec(query).ok()?;
    let mut response = Message::new(request.id(), MessageType::Response, OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.add_queries(request.queries().iter().cloned());

    match behavior {
        MockBehavior::Answer(ip) => {
            let name = request.queries().first()?.name().clone();
            response.add_answer(Record::from_rdata(name, MOCK_ANSWER_TTL, RData::A(A(ip))));
        }
        MockBehavior::Truncated => {
            response.set_truncated(true);
        }
        MockBehavior::Silent => return None,
    }

    response.to_vec().ok()
}

pub fn build_query(id: u16, domain: &str) -> Message {
    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_str(domain).unwrap(), RecordType::A));
    message
}
