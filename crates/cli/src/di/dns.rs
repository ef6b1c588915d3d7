use anyhow::Context;
use sieve_dns_application::ports::{AddressSet, Classifier, DnsCaller, HostsSource, ResponseCache};
use sieve_dns_application::services::{ensure_routable_groups, DomainRouter, UpstreamGroup};
use sieve_dns_application::use_cases::HandleDnsQueryUseCase;
use sieve_dns_domain::{AddressSetBackend, Config, GroupConfig};
use sieve_dns_infrastructure::dns::{
    create_caller, AbpClassifier, DnsResponseCache, HostsTable, IpsetAddressSet,
    MemoryAddressSet, Socks5Dialer,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct DnsServices {
    pub cache: Arc<DnsResponseCache>,
    pub handler_use_case: Arc<HandleDnsQueryUseCase>,
}

impl DnsServices {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        info!("Initializing DNS services");

        let query_timeout = Duration::from_millis(config.query_timeout);
        let router = Self::build_router(config)?;
        let hosts = Self::build_hosts_sources(config);

        let mut groups = Vec::with_capacity(config.groups.len());
        for (name, group_config) in &config.groups {
            groups.push(Self::build_group(name, group_config, query_timeout).await?);
        }
        ensure_routable_groups(&groups).context("Upstream groups are not usable")?;

        let cache = Arc::new(DnsResponseCache::new(&config.cache));
        info!(
            size = config.cache.size,
            min_ttl = config.cache.min_ttl,
            max_ttl = config.cache.max_ttl,
            negative_ttl = config.cache.negative_ttl,
            "Response cache ready"
        );

        let use_case = HandleDnsQueryUseCase::new(
            Arc::new(router),
            groups,
            Arc::clone(&cache) as Arc<dyn ResponseCache>,
        )
        .with_hosts_sources(hosts)
        .with_query_timeout(query_timeout);

        Ok(Self {
            cache,
            handler_use_case: Arc::new(use_case),
        })
    }

    fn build_router(config: &Config) -> anyhow::Result<DomainRouter> {
        let classifier = match &config.gfwlist {
            Some(path) => {
                let classifier = AbpClassifier::from_file(path, config.gfwlist_b64)
                    .with_context(|| format!("Failed to load rule list {}", path))?;
                Some(Arc::new(classifier) as Arc<dyn Classifier>)
            }
            None => {
                info!("No rule list configured, unmatched domains go to the clean group");
                None
            }
        };

        let mut router = DomainRouter::new(&config.suffixes, classifier);
        for (name, group) in &config.groups {
            if group.has_rules() {
                let rules = AbpClassifier::from_rules(&group.rules);
                info!(group = %name, rules = rules.len(), "Group rules loaded");
                router = router.with_group_rules(name.as_str(), Arc::new(rules));
            }
        }
        Ok(router)
    }

    fn build_hosts_sources(config: &Config) -> Vec<Arc<dyn HostsSource>> {
        let mut sources: Vec<Arc<dyn HostsSource>> = Vec::new();

        if !config.hosts.is_empty() {
            sources.push(Arc::new(HostsTable::from_map(&config.hosts)));
        }

        for path in &config.hosts_files {
            match HostsTable::from_file(path) {
                Ok(table) => sources.push(Arc::new(table)),
                Err(e) => warn!(path = %path, error = %e, "Skipping hosts file"),
            }
        }

        sources
    }

    async fn build_group(
        name: &str,
        config: &GroupConfig,
        query_timeout: Duration,
    ) -> anyhow::Result<UpstreamGroup> {
        let dialer = config
            .socks5
            .as_deref()
            .map(|proxy| Arc::new(Socks5Dialer::new(proxy, query_timeout)));

        let mut callers: Vec<Arc<dyn DnsCaller>> = Vec::new();
        for endpoint in config.endpoints() {
            let endpoint = match endpoint {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!(group = %name, error = %e, "Skipping invalid upstream");
                    continue;
                }
            };
            match create_caller(&endpoint, dialer.clone(), query_timeout) {
                Ok(caller) => {
                    info!(group = %name, upstream = %endpoint, proxied = dialer.is_some(), "Upstream configured");
                    callers.push(Arc::new(caller));
                }
                Err(e) => warn!(group = %name, upstream = %endpoint, error = %e, "Skipping upstream"),
            }
        }

        let mut group = UpstreamGroup::new(name).with_callers(callers);

        if let Some(set_name) = &config.ipset {
            let set: Arc<dyn AddressSet> = match config.ipset_backend {
                AddressSetBackend::Ipset => Arc::new(
                    IpsetAddressSet::create(set_name)
                        .await
                        .with_context(|| format!("Failed to create ipset '{}'", set_name))?,
                ),
                AddressSetBackend::Memory => Arc::new(MemoryAddressSet::new(
                    set_name,
                    config
                        .address_set_ttl()
                        .map(|ttl| Duration::from_secs(u64::from(ttl))),
                )),
            };
            info!(group = %name, set = %set_name, backend = ?config.ipset_backend, "Address set attached");
            group = group.with_address_set(set, config.ipset_ttl);
        }

        Ok(group)
    }
}
