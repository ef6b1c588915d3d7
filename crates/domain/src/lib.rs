//! Sieve DNS Domain Layer
pub mod config;
pub mod domain_name;
pub mod errors;
pub mod routing;
pub mod upstream;

pub use config::{
    AddressSetBackend, CacheConfig, CliOverrides, Config, ConfigError, GroupConfig, LoggingConfig,
};
pub use domain_name::{count_loop_markers, is_recursive_query, normalize_domain, LOOP_MARKER};
pub use errors::DomainError;
pub use routing::{RoutingDecision, SuffixRule, CLEAN_GROUP, DIRTY_GROUP};
pub use upstream::UpstreamEndpoint;
