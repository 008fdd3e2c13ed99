use clap::{Parser, Subcommand};
use serde_json::json;
use std::sync::{Arc, Mutex};

use komodo_payment_monitor::config::AppConfig;
use komodo_payment_monitor::error::ListenerError;
use komodo_payment_monitor::{BlockHash, LedgerClient, PaymentListener, PaymentMonitor, RpcClient, TransactionRecord};

#[derive(Parser)]
#[command(name = "monitor-cli")]
#[command(about = "One-shot operator commands against a Komodo wallet node")]
#[command(version)]
struct Cli {
    /// Node JSON-RPC endpoint, overrides configuration
    #[arg(long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single reconciliation pass and print what it found
    Check {
        /// Watermark to start from
        #[arg(long)]
        from: Option<String>,

        /// Ancestor blocks to re-scan
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Resolve or create the deposit address of an account
    Address {
        account: String,
    },

    /// Show a block header
    Block {
        hash: String,
    },

    /// Print a configuration file with default values
    SampleConfig,
}

/// Collects payments of a single pass for printing
#[derive(Default)]
struct Collector {
    payments: Mutex<Vec<TransactionRecord>>,
}

impl PaymentListener for Collector {
    fn name(&self) -> &str {
        "cli-collector"
    }

    fn on_payment_received(&self, transaction: &TransactionRecord) -> Result<(), ListenerError> {
        self.payments
            .lock()
            .map_err(|_| ListenerError::Failed("collector lock poisoned".to_string()))?
            .push(transaction.clone());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Less verbose than the daemon
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Commands::SampleConfig = cli.command {
        println!("{}", AppConfig::generate_sample_config()?);
        return Ok(());
    }

    let mut config = AppConfig::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.rpc.endpoint = endpoint;
    }
    let client = Arc::new(RpcClient::from_config(&config.rpc)?);

    let outcome = match cli.command {
        Commands::Check { from, depth } => check(client, &config, from, depth).await,
        Commands::Address { account } => address(client, &account).await,
        Commands::Block { hash } => block(client, &hash).await,
        Commands::SampleConfig => Ok(()),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn check(
    client: Arc<RpcClient>,
    config: &AppConfig,
    from: Option<String>,
    depth: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut monitor_config = config.monitor.clone();
    if let Some(depth) = depth {
        monitor_config.monitor_depth = depth;
    }
    if from.is_some() {
        monitor_config.start_block = from;
    }

    let monitor = PaymentMonitor::from_config(client, &monitor_config).await?;
    let collector = Arc::new(Collector::default());
    monitor.add_listener(collector.clone()).await;

    let report = monitor.check_now().await?;
    let payments = collector
        .payments
        .lock()
        .map(|p| p.clone())
        .unwrap_or_default();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "report": report,
            "payments": payments,
            "status": monitor.status().await,
        }))?
    );
    Ok(())
}

async fn address(client: Arc<RpcClient>, account: &str) -> Result<(), Box<dyn std::error::Error>> {
    let address = client.resolve_or_create_address(account).await?;
    println!("{}", address);
    Ok(())
}

async fn block(client: Arc<RpcClient>, hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    match client.get_block(&BlockHash::from(hash)).await? {
        Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
        None => {
            eprintln!("Block {} not found", hash);
            std::process::exit(2);
        }
    }
    Ok(())
}
