mod domain_router;
mod host_record;
mod upstream_group;

pub use domain_router::DomainRouter;
pub use host_record::parse_host_record;
pub use upstream_group::{ensure_routable_groups, UpstreamGroup};
