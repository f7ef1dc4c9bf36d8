use std::error::Error;
use std::net::IpAddr;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use log::{debug, info, LevelFilter};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio::runtime;

use bgp_exposed::{Bridge, Engine, ServerConfig, WebSocketServer};

#[derive(Parser, Debug)]
#[clap(name = "bgp-exposed", rename_all = "kebab-case")]
/// Expose a BGP speaker to the browser
struct Args {
    /// Path to config.toml (defaults are used if not provided)
    config_path: Option<String>,
    /// Address clients point their routers at, overrides the config file
    #[clap(long)]
    public_addr: Option<IpAddr>,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences))]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match &args.config_path {
        Some(path) => ServerConfig::from_file(path, args.public_addr)?,
        None => ServerConfig::from_defaults(args.public_addr)?,
    };

    let (crate_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    let mut logger = Builder::new();
    logger
        .filter(Some("bgp_exposed"), crate_level)
        .filter(None, other_level);
    if !config.log_timestamp {
        logger.format_timestamp(None);
    }
    logger.init();
    info!("Logging at levels {}/{}", crate_level, other_level);
    debug!("{:?}", config);

    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(config))
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn Error>> {
    let bridge = Bridge::new();
    let engine = Engine::bind(config.bgp_addr, config.router_id).await?;
    let clients = WebSocketServer::bind(config.http_addr, config.init_data()).await?;
    tokio::spawn(engine.serve(Arc::new(bridge.adapter())));
    tokio::spawn(clients.serve(bridge));

    let mut signals = Signals::new(&[SIGINT, SIGTERM])?;
    let signal = tokio::task::spawn_blocking(move || signals.forever().next()).await?;
    if let Some(signal) = signal {
        info!("Received signal {}, stopping bgp-exposed...", signal);
    }
    Ok(())
}
