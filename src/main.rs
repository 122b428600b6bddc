use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dunning::application::DunningService;
use dunning::application::reports::LogFilter;
use dunning::application::rule_engine::BatchSelection;
use dunning::config::EngineConfig;
use dunning::domain::clock::{FixedClock, SystemClock};
use dunning::domain::customer::CustomerId;
use dunning::domain::payment::{PaymentId, PaymentWebhook};
use dunning::domain::ports::{DunningStore, SharedClock, SharedStore};
use dunning::infrastructure::in_memory::InMemoryStore;
use dunning::infrastructure::transport::SimulatedTransport;
use dunning::interfaces::csv::seed_reader::SeedReader;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dunning", author, version, about, long_about = None)]
struct Cli {
    /// Customers CSV to load before running the command
    #[arg(long, global = true)]
    customers: Option<PathBuf>,

    /// Dunning rules CSV to load before running the command
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Payments CSV to load before running the command
    #[arg(long, global = true)]
    payments: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Business date for overdue calculations (YYYY-MM-DD). Defaults to the current date.
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Delivery attempts per notification channel. Overrides DUNNING_MAX_RETRIES.
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Customers processed concurrently by `process-all`. Overrides DUNNING_WORKERS.
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the rule engine for one customer
    Process { customer_id: CustomerId },
    /// Run the rule engine for every overdue customer
    ProcessAll,
    /// Apply a recorded payment to a customer and restore service
    Cure {
        customer_id: CustomerId,
        payment_id: PaymentId,
    },
    /// Handle a payment gateway webhook read from a JSON file
    Webhook { payload: PathBuf },
    /// List overdue customers, most overdue first
    Overdue,
    /// Show dunning logs, newest first
    Logs {
        #[arg(long)]
        customer: Option<CustomerId>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the curing history of a customer
    History { customer_id: CustomerId },
    /// Show curing actions across all customers, newest first
    Actions {
        /// Print only the number of curing actions
        #[arg(long)]
        count: bool,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(max_retries) = cli.max_retries {
        config = config.with_max_retries(max_retries);
    }
    if let Some(workers) = cli.workers {
        config = config.with_worker_count(workers);
    }
    let config = config.validated()?;

    let store = open_store(cli.db_path.as_deref())?;
    seed(store.as_ref(), &cli).await?;

    let clock: SharedClock = match cli.today {
        Some(today) => Arc::new(FixedClock::new(today)),
        None => Arc::new(SystemClock),
    };
    let service = DunningService::new(store, Arc::new(SimulatedTransport::new()), clock, &config);

    match cli.command {
        Command::Process { customer_id } => {
            print_json(&service.rule_engine.process_customer(customer_id).await?)
        }
        Command::ProcessAll => print_json(
            &service
                .rule_engine
                .run_batch(BatchSelection::AllOverdue)
                .await?,
        ),
        Command::Cure {
            customer_id,
            payment_id,
        } => print_json(&service.curing.execute_curing(customer_id, payment_id).await),
        Command::Webhook { payload } => {
            let file = File::open(payload).into_diagnostic()?;
            let payload: PaymentWebhook = serde_json::from_reader(file).into_diagnostic()?;
            print_json(&service.curing.process_payment_webhook(&payload).await?)
        }
        Command::Overdue => print_json(&service.reports.overdue_customers().await?),
        Command::Logs {
            customer,
            from,
            to,
            offset,
            limit,
        } => {
            let filter = LogFilter {
                customer_id: customer,
                from,
                to,
                offset,
                limit,
            };
            print_json(&service.reports.dunning_logs(&filter).await?)
        }
        Command::History { customer_id } => {
            print_json(&service.reports.curing_history(customer_id).await?)
        }
        Command::Actions {
            count: true, ..
        } => print_json(&serde_json::json!({
            "count": service.reports.curing_action_count().await?
        })),
        Command::Actions { offset, limit, .. } => {
            print_json(&service.reports.all_curing_actions(offset, limit).await?)
        }
    }
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dunning=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<SharedStore> {
    use dunning::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "using RocksDB storage");
            Ok(Arc::new(RocksDBStore::open(path)?))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<SharedStore> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Arc::new(InMemoryStore::new()))
}

async fn seed(store: &dyn DunningStore, cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.customers {
        let mut count = 0;
        for customer in SeedReader::new(open(path)?).customers() {
            store.put_customer(customer?).await?;
            count += 1;
        }
        info!(count, "customers loaded");
    }
    if let Some(path) = &cli.rules {
        let mut count = 0;
        for rule in SeedReader::new(open(path)?).rules() {
            store.put_rule(rule?).await?;
            count += 1;
        }
        info!(count, "rules loaded");
    }
    if let Some(path) = &cli.payments {
        let mut count = 0;
        for payment in SeedReader::new(open(path)?).payments() {
            store.put_payment(payment?).await?;
            count += 1;
        }
        info!(count, "payments loaded");
    }
    Ok(())
}

fn open(path: &Path) -> Result<File> {
    File::open(path).into_diagnostic()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
