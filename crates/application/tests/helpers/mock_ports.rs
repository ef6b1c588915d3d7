#![allow(dead_code)]

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use sieve_dns_application::ports::{
    AddressSet, CacheLookup, CallError, Classifier, DnsCaller, HostsSource, ResponseCache,
    ResponseWriter,
};
use sieve_dns_domain::DomainError;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REQUEST_ID: u16 = 0x1234;

pub fn make_query(name: &str, record_type: RecordType) -> Message {
    let mut message = Message::new(REQUEST_ID, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

pub fn a_record(name: &str, ip: Ipv4Addr, ttl: u32) -> Record {
    Record::from_rdata(Name::from_str(name).unwrap(), ttl, RData::A(A(ip)))
}

/// Upstream-style answer to `request` carrying one A record per address.
pub fn answer_with(request: &Message, ips: &[Ipv4Addr]) -> Message {
    let mut response = Message::new(request.id(), MessageType::Response, OpCode::Query);
    response.add_queries(request.queries().iter().cloned());
    if let Some(query) = request.queries().first() {
        let name = query.name().to_ascii();
        for ip in ips {
            response.add_answer(a_record(&name, *ip, 300));
        }
    }
    response
}

// ── DnsCaller ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum CallerBehavior {
    Answer(Vec<Ipv4Addr>),
    Fail,
    Partial(Vec<Ipv4Addr>),
    Hang,
}

pub struct MockDnsCaller {
    upstream: String,
    behavior: CallerBehavior,
    calls: AtomicUsize,
    requests: Mutex<Vec<Message>>,
}

impl MockDnsCaller {
    pub fn new(upstream: &str, behavior: CallerBehavior) -> Arc<Self> {
        Arc::new(Self {
            upstream: upstream.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(upstream: &str, ip: Ipv4Addr) -> Arc<Self> {
        Self::new(upstream, CallerBehavior::Answer(vec![ip]))
    }

    pub fn failing(upstream: &str) -> Arc<Self> {
        Self::new(upstream, CallerBehavior::Fail)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Message> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsCaller for MockDnsCaller {
    async fn call(&self, request: &Message) -> Result<Message, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            CallerBehavior::Answer(ips) => Ok(answer_with(request, ips)),
            CallerBehavior::Fail => Err(CallError::new(DomainError::Transport(format!(
                "{} unreachable",
                self.upstream
            )))),
            CallerBehavior::Partial(ips) => {
                let mut partial = answer_with(request, ips);
                partial.set_truncated(true);
                Err(CallError::with_partial(
                    DomainError::Truncated {
                        server: self.upstream.clone(),
                    },
                    partial,
                ))
            }
            CallerBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(CallError::new(DomainError::TransportTimeout {
                    server: self.upstream.clone(),
                }))
            }
        }
    }

    fn upstream(&self) -> &str {
        &self.upstream
    }
}

// ── Classifier ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClassifier {
    rules: HashMap<String, bool>,
    seen: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, domain: &str, blocked: bool) -> Self {
        self.rules.insert(domain.to_string(), blocked);
        self
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for MockClassifier {
    fn is_blocked(&self, domain: &str) -> Option<bool> {
        self.seen.lock().unwrap().push(domain.to_string());
        self.rules.get(domain).copied()
    }
}

// ── HostsSource ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockHostsSource {
    records: HashMap<(String, RecordType), String>,
    lookups: Mutex<Vec<String>>,
}

impl MockHostsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, domain: &str, record_type: RecordType, text: &str) -> Self {
        self.records
            .insert((domain.to_string(), record_type), text.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl HostsSource for MockHostsSource {
    fn gen_record(&self, domain: &str, record_type: RecordType) -> Option<String> {
        self.lookups.lock().unwrap().push(domain.to_string());
        self.records
            .get(&(domain.to_string(), record_type))
            .cloned()
    }
}

// ── ResponseCache ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockResponseCache {
    entries: Mutex<HashMap<(String, RecordType, usize), Option<Message>>>,
    extras: Mutex<Vec<Vec<Record>>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MockResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(query: &Query, extra: &[Record]) -> (String, RecordType, usize) {
        (
            query.name().to_ascii().to_ascii_lowercase(),
            query.query_type(),
            extra.len(),
        )
    }

    pub fn insert_negative(&self, name: &str, record_type: RecordType) {
        let query = Query::query(Name::from_str(name).unwrap(), record_type);
        self.entries
            .lock()
            .unwrap()
            .insert(Self::key(&query, &[]), None);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Extra records passed to each `get`, in call order.
    pub fn extras(&self) -> Vec<Vec<Record>> {
        self.extras.lock().unwrap().clone()
    }

    pub fn entry(&self, name: &str, record_type: RecordType) -> Option<Option<Message>> {
        let query = Query::query(Name::from_str(name).unwrap(), record_type);
        self.entries
            .lock()
            .unwrap()
            .get(&Self::key(&query, &[]))
            .cloned()
    }
}

impl ResponseCache for MockResponseCache {
    fn get(&self, query: &Query, extra: &[Record]) -> CacheLookup {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.extras.lock().unwrap().push(extra.to_vec());
        match self.entries.lock().unwrap().get(&Self::key(query, extra)) {
            Some(Some(message)) => CacheLookup::Hit(message.clone()),
            Some(None) => CacheLookup::Negative,
            None => CacheLookup::Miss,
        }
    }

    fn set(&self, query: &Query, extra: &[Record], response: Option<&Message>) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(Self::key(query, extra), response.cloned());
    }
}

// ── AddressSet ──────────────────────────────────────────────────────────────

pub struct MockAddressSet {
    name: String,
    fail: bool,
    added: Mutex<Vec<(Ipv4Addr, u32)>>,
}

impl MockAddressSet {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            added: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            added: Mutex::new(Vec::new()),
        })
    }

    pub fn added(&self) -> Vec<(Ipv4Addr, u32)> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl AddressSet for MockAddressSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, addr: Ipv4Addr, ttl: u32) -> Result<(), DomainError> {
        self.added.lock().unwrap().push((addr, ttl));
        if self.fail {
            return Err(DomainError::AddressSet {
                set: self.name.clone(),
                address: addr.to_string(),
                reason: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

// ── ResponseWriter ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SentReplies {
    sent: Arc<Mutex<Vec<Message>>>,
    closed: Arc<AtomicBool>,
}

impl SentReplies {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockResponseWriter {
    replies: SentReplies,
}

impl MockResponseWriter {
    pub fn new() -> (Self, SentReplies) {
        let replies = SentReplies::default();
        (
            Self {
                replies: replies.clone(),
            },
            replies,
        )
    }
}

#[async_trait]
impl ResponseWriter for MockResponseWriter {
    async fn write(&mut self, response: &Message) -> Result<(), DomainError> {
        self.replies.sent.lock().unwrap().push(response.clone());
        Ok(())
    }
}

impl Drop for MockResponseWriter {
    fn drop(&mut self) {
        self.replies.closed.store(true, Ordering::SeqCst);
    }
}
