use sieve_dns_domain::Config;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` directives are added on top of
/// the configured level.
pub fn init_logging(config: &Config) {
    let level: Level = config.logging.level.parse().unwrap_or(Level::INFO);

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    if config.logging.format.eq_ignore_ascii_case("json") {
        subscriber.json().init();
    } else {
        subscriber.with_ansi(true).init();
    }

    info!("Logging initialized at level: {}", level);
}
