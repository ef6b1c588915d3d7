pub mod cache;
pub mod errors;
pub mod group;
pub mod logging;
pub mod root;

pub use cache::CacheConfig;
pub use errors::ConfigError;
pub use group::{AddressSetBackend, GroupConfig};
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config};
