use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{RData, Record, RecordType};
use rustc_hash::FxHashMap;
use sieve_dns_domain::{is_recursive_query, DomainError};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::ports::{CacheLookup, CallError, HostsSource, ResponseCache, ResponseWriter};
use crate::services::{parse_host_record, DomainRouter, UpstreamGroup};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// How a request ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Hosts,
    Cached,
    /// A recent failure for the same question is cached; nothing was sent.
    NegativeCached,
    Forwarded { group: Arc<str> },
}

/// Answers one client request: loop guard, hosts, cache, routing, then
/// sequential upstream fallback within the chosen group.
pub struct HandleDnsQueryUseCase {
    router: Arc<DomainRouter>,
    groups: FxHashMap<Arc<str>, Arc<UpstreamGroup>>,
    hosts: Vec<Arc<dyn HostsSource>>,
    cache: Arc<dyn ResponseCache>,
    query_timeout: Duration,
}

impl HandleDnsQueryUseCase {
    pub fn new(
        router: Arc<DomainRouter>,
        groups: impl IntoIterator<Item = UpstreamGroup>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        let groups = groups
            .into_iter()
            .map(|group| (Arc::clone(&group.name), Arc::new(group)))
            .collect();

        Self {
            router,
            groups,
            hosts: Vec::new(),
            cache,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sources are consulted in the given order.
    pub fn with_hosts_sources(mut self, hosts: Vec<Arc<dyn HostsSource>>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Handles `request` and writes at most one reply to `writer`. The writer is
    /// consumed, so it is closed whichever way the request ends.
    pub async fn execute<W: ResponseWriter>(
        &self,
        request: &Message,
        mut writer: W,
    ) -> Result<QueryOutcome, DomainError> {
        let question = request.queries().first().cloned().ok_or_else(|| {
            DomainError::InvalidRequest("DNS request carries no question".to_string())
        })?;
        let domain = question.name().to_ascii();

        if is_recursive_query(&domain) {
            error!(domain = %domain, "Recursive query detected, dropping request");
            return Err(DomainError::RecursiveQuery(domain));
        }

        if let Some(record) = self.lookup_hosts(&question, &domain)? {
            info!(domain = %domain, "Matched hosts");
            let mut answer = Message::new(request.id(), MessageType::Response, request.op_code());
            answer.add_answer(record);
            respond(request, answer, &mut writer).await;
            return Ok(QueryOutcome::Hosts);
        }

        let extra = request_extras(request);
        match self.cache.get(&question, &extra) {
            CacheLookup::Hit(answer) => {
                info!(domain = %domain, "Hit cache");
                respond(request, answer, &mut writer).await;
                return Ok(QueryOutcome::Cached);
            }
            CacheLookup::Negative => {
                info!(domain = %domain, "Hit negative cache entry, not answering");
                return Ok(QueryOutcome::NegativeCached);
            }
            CacheLookup::Miss => {}
        }

        let decision = self.router.resolve(&domain);
        info!(
            domain = %domain,
            group = %decision.group,
            reason = %decision.reason,
            "Matched group"
        );

        let Some(group) = self.groups.get(&decision.group) else {
            error!(domain = %domain, group = %decision.group, "Group is not configured");
            return Err(DomainError::GroupNotFound(decision.group.to_string()));
        };

        let upstream_request = build_upstream_request(&question, request);
        let answer = self.dispatch(group, &upstream_request).await;
        self.cache.set(&question, &extra, answer.as_ref());

        let Some(answer) = answer else {
            error!(domain = %domain, group = %group.name, "All upstream servers failed");
            return Err(DomainError::AllUpstreamsFailed(group.name.to_string()));
        };

        write_address_set(group, &answer).await;
        respond(request, answer, &mut writer).await;

        Ok(QueryOutcome::Forwarded {
            group: Arc::clone(&group.name),
        })
    }

    fn lookup_hosts(&self, question: &Query, domain: &str) -> Result<Option<Record>, DomainError> {
        let record_type = question.query_type();
        if !matches!(record_type, RecordType::A | RecordType::AAAA) {
            return Ok(None);
        }

        let hostname = domain.strip_suffix('.').unwrap_or(domain);
        for source in &self.hosts {
            let text = source
                .gen_record(hostname, record_type)
                .or_else(|| source.gen_record(domain, record_type));

            if let Some(text) = text {
                return parse_host_record(&text).map(Some).inspect_err(|e| {
                    error!(domain = %domain, record = %text, error = %e, "Failed to build hosts record");
                });
            }
        }
        Ok(None)
    }

    /// Tries the group's callers in order; the first response wins.
    async fn dispatch(&self, group: &UpstreamGroup, request: &Message) -> Option<Message> {
        for caller in &group.callers {
            match tokio::time::timeout(self.query_timeout, caller.call(request)).await {
                Ok(Ok(response)) => {
                    debug!(group = %group.name, upstream = %caller.upstream(), "Upstream answered");
                    return Some(response);
                }
                Ok(Err(CallError { error, partial })) => {
                    warn!(
                        group = %group.name,
                        upstream = %caller.upstream(),
                        error = %error,
                        "Upstream query failed"
                    );
                    if let Some(partial) = partial {
                        return Some(*partial);
                    }
                }
                Err(_) => {
                    warn!(
                        group = %group.name,
                        upstream = %caller.upstream(),
                        timeout_ms = self.query_timeout.as_millis() as u64,
                        "Upstream query timed out"
                    );
                }
            }
        }
        None
    }
}

/// Additional records of `request` with its EDNS section put back as an OPT
/// record; the decoder lifts OPT out of the additional section.
fn request_extras(request: &Message) -> Vec<Record> {
    let mut extra = request.additionals().to_vec();
    if let Some(edns) = request.extensions() {
        extra.push(Record::from(edns));
    }
    extra
}

/// Fresh query for `question` carrying the client's additional records and
/// EDNS section under a new id.
fn build_upstream_request(question: &Query, request: &Message) -> Message {
    let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(question.clone());
    message.add_additionals(request.additionals().iter().cloned());
    if let Some(edns) = request.extensions() {
        message.set_edns(edns.clone());
    }
    message
}

async fn write_address_set(group: &UpstreamGroup, answer: &Message) {
    let Some(set) = &group.address_set else {
        return;
    };

    for addr in ipv4_answers(answer) {
        if let Err(e) = set.add(addr, group.address_set_ttl).await {
            warn!(group = %group.name, set = %set.name(), address = %addr, error = %e, "Failed to add address to set");
        }
    }
}

/// IPv4 addresses of the A records in the answer section.
pub fn ipv4_answers(message: &Message) -> Vec<Ipv4Addr> {
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .collect()
}

/// Stamps `answer` as the reply to `request` and writes it.
/// The reply carries OPT only when the request did.
async fn respond<W: ResponseWriter>(request: &Message, mut answer: Message, writer: &mut W) {
    let mut header = *answer.header();
    header
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true);
    answer.set_header(header);
    answer.take_queries();
    answer.add_queries(request.queries().iter().cloned());

    match request.extensions() {
        None => *answer.extensions_mut() = None,
        Some(edns) if answer.extensions().is_none() => {
            answer.set_edns(edns.clone());
        }
        Some(_) => {}
    }

    if let Err(e) = writer.write(&answer).await {
        warn!(error = %e, "Failed to write DNS response");
    }
}
