mod handle_dns_query;

pub use handle_dns_query::{ipv4_answers, HandleDnsQueryUseCase, QueryOutcome, DEFAULT_QUERY_TIMEOUT};
