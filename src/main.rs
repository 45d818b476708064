use clap::Parser;
use enrollpay::application::config::EngineConfig;
use enrollpay::application::engine::{EnginePorts, OrderEngine};
use enrollpay::domain::ports::{CouponStore, EnrollmentStore, OrderStore, PurchaseLedger};
use enrollpay::infrastructure::in_memory::InMemoryStore;
use enrollpay::infrastructure::payment::SimulatedGateway;
#[cfg(feature = "storage-rocksdb")]
use enrollpay::infrastructure::rocksdb::RocksDBStore;
use enrollpay::interfaces::catalog::CatalogFile;
use enrollpay::interfaces::csv::command_reader::CommandReader;
use enrollpay::interfaces::csv::order_writer::OrderWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Purchase commands CSV file
    input: PathBuf,

    /// JSON file with the course catalog and coupon definitions
    #[arg(long, env = "ENROLLPAY_CATALOG")]
    catalog: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "ENROLLPAY_DB_PATH")]
    db_path: Option<PathBuf>,

    #[arg(long, env = "ENROLLPAY_PAYMENT_TIMEOUT_MS", default_value_t = 5000)]
    payment_timeout_ms: u64,

    #[arg(long, env = "ENROLLPAY_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    storage_timeout_ms: u64,

    /// Report other users' orders as missing instead of forbidden
    #[arg(long, env = "ENROLLPAY_CONCEAL_FOREIGN_ORDERS")]
    conceal_foreign_orders: bool,

    /// Payment methods the simulated gateway declines (repeatable)
    #[arg(long = "decline-method", env = "ENROLLPAY_DECLINE_METHODS", value_delimiter = ',')]
    decline_methods: Vec<String>,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            storage_timeout: Duration::from_millis(self.storage_timeout_ms),
            payment_timeout: Duration::from_millis(self.payment_timeout_ms),
            conceal_foreign_orders: self.conceal_foreign_orders,
            ..EngineConfig::default()
        }
    }

    fn gateway(&self) -> SimulatedGateway {
        self.decline_methods
            .iter()
            .fold(SimulatedGateway::new(), |gateway, method| {
                gateway.declining(method.clone())
            })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let catalog = CatalogFile::from_path(&cli.catalog)?;
    tracing::info!(
        courses = catalog.courses.len(),
        coupons = catalog.coupons.len(),
        "Catalog loaded"
    );

    match cli.db_path.clone() {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = RocksDBStore::open(&db_path)?;
            tracing::info!(path = %db_path.display(), "Using RocksDB storage");
            run(&cli, catalog, store).await
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            run(&cli, catalog, InMemoryStore::new()).await
        }
        None => run(&cli, catalog, InMemoryStore::new()).await,
    }
}

async fn run<S>(cli: &Cli, catalog: CatalogFile, store: S) -> Result<()>
where
    S: CouponStore + OrderStore + EnrollmentStore + PurchaseLedger + Clone + 'static,
{
    let seeded = catalog.seed_coupons(&store).await?;
    tracing::debug!(seeded, "Coupons seeded");

    let ports = EnginePorts::from_store(catalog.course_catalog(), store.clone(), cli.gateway());
    let engine = OrderEngine::new(ports, cli.engine_config());

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (row, command) in reader.commands().enumerate() {
        match command {
            Ok(command) => {
                if let Err(e) = command.execute(&engine).await {
                    tracing::warn!(row = row + 1, code = %e.code(), "Command rejected: {e}");
                }
            }
            Err(e) => {
                tracing::warn!(row = row + 1, "Error reading command: {e}");
            }
        }
    }

    let orders = store.all_orders().await?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(orders)?;

    Ok(())
}
