use clap::Parser;
use sieve_dns_domain::CliOverrides;
use sieve_dns_infrastructure::dns::DnsServerHandler;
use tracing::info;

mod bootstrap;
mod di;
mod server;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "sieve-dns")]
#[command(version)]
#[command(about = "Sieve DNS - policy-driven DNS forwarding proxy")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// UDP listen address, e.g. 0.0.0.0:53 or :5353
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        listen: cli.listen.clone(),
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    info!("Starting Sieve DNS v{}", env!("CARGO_PKG_VERSION"));

    let dns_services = di::DnsServices::new(&config).await?;
    let dns_handler = DnsServerHandler::new(dns_services.handler_use_case.clone());
    let listen_addr = config.listen_addr()?;

    tokio::select! {
        result = server::start_dns_server(listen_addr, dns_handler) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!(cached_entries = dns_services.cache.len(), "Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
