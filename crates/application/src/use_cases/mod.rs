pub mod dns;

pub use dns::{ipv4_answers, HandleDnsQueryUseCase, QueryOutcome};
