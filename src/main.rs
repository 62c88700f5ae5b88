use anyhow::Result;
use asic_scanner::{config::Config, metrics::MetricsCollector, server};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// Subnet to scan, `a.b.c.*` or CIDR (overrides config)
    #[arg(long, env = "SUBNET")]
    subnet: Option<String>,

    /// Port to listen on for metrics
    #[arg(short, long, env = "SCANNER_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "SCANNER_ADDR")]
    addr: Option<String>,

    /// Run a single scan cycle, print the report as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting ASIC Scanner v{}", env!("CARGO_PKG_VERSION"));

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(subnet) = args.subnet {
        config.scanner.subnet = subnet;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    info!("Configuration loaded successfully");
    info!(
        "Subnet: {} (API port {})",
        config.scanner.subnet, config.scanner.port
    );

    if args.once {
        let metrics = MetricsCollector::new()?;
        let scanner = server::build_scanner(&config, &metrics)?;
        let report = scanner.run_cycle().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    info!(
        "Metrics endpoint: http://{}:{}/metrics",
        config.server.addr, config.server.port
    );

    // Start the scanner and metrics server
    if let Err(e) = server::start(config).await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
