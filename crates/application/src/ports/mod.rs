mod address_set;
mod classifier;
mod dns_caller;
mod hosts_source;
mod response_cache;
mod response_writer;

pub use address_set::AddressSet;
pub use classifier::Classifier;
pub use dns_caller::{CallError, DnsCaller};
pub use hosts_source::HostsSource;
pub use response_cache::{CacheLookup, ResponseCache};
pub use response_writer::ResponseWriter;
