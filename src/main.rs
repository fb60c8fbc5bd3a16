use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use payment_gateway::application::Gateway;
use payment_gateway::application::resolution::ResolutionBridge;
use payment_gateway::config::{QueueArgs, QueueConfig, RiskArgs};
use payment_gateway::domain::ports::{AccountStoreRef, InvoiceStoreRef};
use payment_gateway::domain::risk::{RiskConfig, ThresholdRiskPolicy};
use payment_gateway::infrastructure::in_memory::{InMemoryAccountStore, InMemoryInvoiceStore};
use payment_gateway::infrastructure::in_memory_queue::topic;
use payment_gateway::interfaces::csv::account_writer::AccountWriter;
use payment_gateway::interfaces::csv::replay::Replayer;
use payment_gateway::interfaces::csv::request_reader::RequestReader;
use payment_gateway::telemetry::init_tracing;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(flatten)]
    risk: RiskArgs,

    #[command(flatten)]
    queue: QueueArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a CSV file of requests and print the resulting accounts
    Replay {
        /// Input requests CSV file
        input: PathBuf,
    },
    /// Publish deferrals to and consume verdicts from Kafka until interrupted
    #[cfg(feature = "kafka")]
    Serve,
}

fn open_storage(db_path: Option<PathBuf>) -> Result<(AccountStoreRef, InvoiceStoreRef)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        use payment_gateway::infrastructure::rocksdb::RocksDBStore;
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok((
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(InMemoryInvoiceStore::new()),
    ))
}

async fn replay(
    input: PathBuf,
    stores: (AccountStoreRef, InvoiceStoreRef),
    risk: RiskConfig,
    queue: QueueConfig,
) -> Result<()> {
    let policy = ThresholdRiskPolicy::new(&risk).into_diagnostic()?;
    let (deferral_writer, mut deferral_reader) = topic(queue.deferral_topic);
    let (verdict_writer, verdict_reader) = topic(queue.verdict_topic);

    let gateway = Gateway::new(stores.0, stores.1, Arc::new(policy), Arc::new(deferral_writer));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bridge = ResolutionBridge::new(gateway.transactions.clone(), Box::new(verdict_reader));
    let consumer = tokio::spawn(bridge.run(shutdown_rx));

    let mut replayer = Replayer::new(gateway, verdict_writer);
    let file = File::open(input).into_diagnostic()?;
    for request in RequestReader::new(file).requests() {
        match request {
            Ok(request) => {
                if let Err(e) = replayer.apply(request).await {
                    warn!(error = %e, "Error processing request");
                }
            }
            Err(e) => warn!(error = %e, "Error reading request"),
        }
    }

    // Let the consumer drain what is queued, then stop on end of input.
    replayer.close_verdicts();
    let report = consumer.await.into_diagnostic()?;
    drop(shutdown_tx);

    let deferred = deferral_reader.drain().len();
    info!(deferred, verdicts_applied = report.applied, "replay finished");

    let summaries = replayer.summaries().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(summaries).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "kafka")]
async fn serve(
    stores: (AccountStoreRef, InvoiceStoreRef),
    risk: RiskConfig,
    queue: QueueConfig,
) -> Result<()> {
    use payment_gateway::infrastructure::kafka::{KafkaConsumer, KafkaPublisher};

    let policy = ThresholdRiskPolicy::new(&risk).into_diagnostic()?;
    let publisher = KafkaPublisher::new(&queue).into_diagnostic()?;
    let consumer = KafkaConsumer::new(&queue).into_diagnostic()?;
    let gateway = Gateway::new(stores.0, stores.1, Arc::new(policy), Arc::new(publisher));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bridge = ResolutionBridge::new(gateway.transactions.clone(), Box::new(consumer));
    let handle = tokio::spawn(bridge.run(shutdown_rx));

    tokio::signal::ctrl_c().await.into_diagnostic()?;
    info!("interrupt received");
    let _ = shutdown_tx.send(true);
    handle.await.into_diagnostic()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let stores = open_storage(cli.db_path)?;
    let risk = RiskConfig::from(cli.risk);
    let queue = QueueConfig::from(cli.queue);

    match cli.command {
        Command::Replay { input } => replay(input, stores, risk, queue).await,
        #[cfg(feature = "kafka")]
        Command::Serve => serve(stores, risk, queue).await,
    }
}
