//! Sieve DNS infrastructure: transports, cache, rule lists, hosts tables,
//! address sets and the UDP request handler.
pub mod dns;
