use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{DNSClass, Record, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use lru::LruCache;
use rustc_hash::FxBuildHasher;
use sieve_dns_application::ports::{CacheLookup, ResponseCache};
use sieve_dns_domain::CacheConfig;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::dns::forwarding::ResponseParser;

/// Cache key: question plus the wire form of the request's extra records, so
/// requests differing only in EDNS options are cached apart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    pub record_type: RecordType,
    pub class: DNSClass,
    pub extra: Vec<u8>,
}

impl CacheKey {
    pub fn new(query: &Query, extra: &[Record]) -> Self {
        Self {
            name: query.name().to_ascii().to_ascii_lowercase(),
            record_type: query.query_type(),
            class: query.query_class(),
            extra: encode_records(extra),
        }
    }
}

fn encode_records(records: &[Record]) -> Vec<u8> {
    if records.is_empty() {
        return Vec::new();
    }
    let mut buf = Vec::with_capacity(64);
    let mut encoder = BinEncoder::new(&mut buf);
    for record in records {
        // Keep the prefix encoded so far.
        if record.emit(&mut encoder).is_err() {
            break;
        }
    }
    buf
}

#[derive(Clone, Debug)]
struct CacheEntry {
    /// `None` marks a negative entry.
    response: Option<Message>,
    expires_at: Instant,
}

impl CacheEntry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Bounded LRU response cache.
pub struct DnsResponseCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry, FxBuildHasher>>,
    min_ttl: u32,
    max_ttl: u32,
    negative_ttl: u32,
}

impl DnsResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher)),
            min_ttl: config.min_ttl,
            max_ttl: config.max_ttl.max(config.min_ttl),
            negative_ttl: config.negative_ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Seconds an entry for `response` stays valid.
    pub fn ttl_for(&self, response: Option<&Message>) -> u32 {
        match response {
            None => self.negative_ttl,
            Some(message) => match ResponseParser::min_answer_ttl(message) {
                Some(ttl) => ttl.clamp(self.min_ttl, self.max_ttl),
                None => self.min_ttl,
            },
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry, FxBuildHasher>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResponseCache for DnsResponseCache {
    fn get(&self, query: &Query, extra: &[Record]) -> CacheLookup {
        let key = CacheKey::new(query, extra);
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get(&key) {
            None => return CacheLookup::Miss,
            Some(entry) if !entry.is_expired(now) => {
                return match &entry.response {
                    Some(message) => CacheLookup::Hit(message.clone()),
                    None => CacheLookup::Negative,
                };
            }
            Some(_) => {}
        }

        entries.pop(&key);
        debug!(domain = %key.name, record_type = ?key.record_type, "Cache entry expired");
        CacheLookup::Miss
    }

    fn set(&self, query: &Query, extra: &[Record], response: Option<&Message>) {
        let ttl = self.ttl_for(response);
        let key = CacheKey::new(query, extra);
        let entry = CacheEntry {
            response: response.cloned(),
            expires_at: Instant::now() + Duration::from_secs(u64::from(ttl)),
        };

        debug!(
            domain = %key.name,
            record_type = ?key.record_type,
            ttl = ttl,
            negative = response.is_none(),
            "Cache entry stored"
        );
        self.lock().put(key, entry);
    }
}
