#![allow(dead_code)]
pub mod dns_server_mock;
pub mod socks5_mock;
pub mod tls_mock;

pub use dns_server_mock::{build_query, MockBehavior, MockDnsServer, MOCK_ANSWER_TTL};
pub use socks5_mock::MockSocks5Server;
pub use tls_mock::{MockDohServer, MockDotServer, RecordedHttpRequest, TLS_SERVER_NAME};
