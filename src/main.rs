use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use komodo_payment_monitor::config::AppConfig;
use komodo_payment_monitor::logging::init_logging;
use komodo_payment_monitor::{LoggingListener, PaymentMonitor, PollScheduler, RpcClient};

#[derive(Parser)]
#[command(name = "payment-monitor")]
#[command(about = "Watches a Komodo wallet node for incoming payments and new blocks")]
#[command(version)]
struct Args {
    /// Node JSON-RPC endpoint, credentials may be embedded
    #[arg(long)]
    endpoint: Option<String>,

    /// Ancestor blocks re-scanned on every pass
    #[arg(long)]
    depth: Option<u32>,

    /// Milliseconds between passes
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Block hash to start from instead of the node's full history
    #[arg(long)]
    start_block: Option<String>,

    /// komodo.conf to read RPC credentials and port from
    #[arg(long)]
    node_conf: Option<String>,

    /// Use testnet default port when reading the node conf
    #[arg(long)]
    testnet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = AppConfig::load_with_node_conf(args.node_conf.as_deref(), args.testnet)?;
    if let Some(endpoint) = args.endpoint {
        config.rpc.endpoint = endpoint;
    }
    if let Some(depth) = args.depth {
        config.monitor.monitor_depth = depth;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.monitor.poll_interval_ms = interval_ms;
    }
    if let Some(start_block) = args.start_block {
        config.monitor.start_block = Some(start_block);
    }
    config.validate()?;

    init_logging(&config.logging)?;
    info!("Starting Komodo payment monitor against {}", config.rpc.endpoint);

    let ledger = Arc::new(RpcClient::from_config(&config.rpc)?);
    // the scheduler sets the start block, retrying while the node is unreachable
    let monitor = Arc::new(PaymentMonitor::new(ledger, config.monitor.monitor_depth));
    monitor.add_listener(Arc::new(LoggingListener)).await;

    let scheduler = PollScheduler::from_config(monitor.clone(), &config.monitor);
    let (stop, task) = scheduler.spawn();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                stop.stop();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    let stats = task.await?;
    let status = monitor.status().await;
    info!(
        "Payment monitor stopped after {} passes ({} failed), watermark {:?}",
        stats.passes,
        stats.failures,
        status.last_block.as_ref().map(|b| b.as_str())
    );

    Ok(())
}
