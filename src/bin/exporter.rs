use std::net::SocketAddr;

use activemq_exporter::api::spawn_http_server;
use activemq_exporter::config::Config;
use activemq_exporter::discovery::DiscoveryTiming;
use activemq_exporter::metrics::init_metrics;
use activemq_exporter::scraper::ScraperHandle;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Override the HTTP port from the environment
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the scrape interval (seconds) from the environment
    #[arg(short, long)]
    interval: Option<u64>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("activemq_exporter", LevelFilter::DEBUG),
        ("exporter", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        debug!("rustls crypto provider already installed: {e:?}");
    }

    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(interval) = args.interval {
        config.scrape_interval_secs = interval;
    }

    let brokers = config
        .endpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    info!("broker(s): {brokers} (tls: {})", config.use_tls);

    let prometheus = init_metrics();

    let (event_tx, _) = broadcast::channel(16);
    let scraper = ScraperHandle::spawn(config.clone(), DiscoveryTiming::default(), event_tx);

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    spawn_http_server(bind_addr, prometheus).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scraper.shutdown().await;

    Ok(())
}
