pub mod address_set;
pub mod cache;
pub mod classifier;
pub mod forwarding;
pub mod hosts;
pub mod server;
pub mod transport;

pub use address_set::{IpsetAddressSet, MemoryAddressSet};
pub use cache::{CacheKey, DnsResponseCache};
pub use classifier::AbpClassifier;
pub use hosts::HostsTable;
pub use server::{DnsServerHandler, UdpResponseWriter};
pub use transport::{create_caller, Caller, Socks5Dialer};
