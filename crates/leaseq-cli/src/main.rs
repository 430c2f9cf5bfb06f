use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use leaseq_core::models::{ItemId, ItemPayload, ItemResult};
use leaseq_core::{QueueConfig, QueueService};
use leaseq_db::{Database, DatabaseConfig, PgItemStore};

#[derive(Parser)]
#[command(name = "leaseq", version, about = "Lease-based work-item queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Add items from a JSON file holding an array of payloads
    Enqueue {
        /// Path to the payload file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Lease a batch of eligible items and print it
    Claim {
        /// Items to lease (defaults to LEASEQ_DEFAULT_BATCH_SIZE)
        #[arg(short, long)]
        batch_size: Option<i64>,
    },

    /// Write results from a JSON file holding an array of result rows
    Submit {
        /// Path to the results file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Release every lease whose expiry has passed
    Expire,

    /// Print a single work item
    Show {
        /// Work item ID
        id: i64,
    },

    /// Print item counts by lifecycle position
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leaseq=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let db = connect_db().await?;
    if matches!(cli.command, Commands::Migrate) {
        return Ok(());
    }

    let config = QueueConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let queue = QueueService::new(db.item_store(), config);

    match cli.command {
        // Already handled by connect_db.
        Commands::Migrate => {}
        Commands::Enqueue { file } => cmd_enqueue(&queue, &file).await?,
        Commands::Claim { batch_size } => {
            let batch = queue
                .claim_batch(batch_size)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            tracing::info!(count = batch.len(), "Claimed batch");
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        Commands::Submit { file } => cmd_submit(&queue, &file).await?,
        Commands::Expire => {
            let released = queue.expire_now().await.map_err(|e| anyhow::anyhow!(e))?;
            println!("Released {released} expired lease(s)");
        }
        Commands::Show { id } => {
            let item = queue
                .get_item(ItemId(id))
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Commands::Stats => {
            let stats = queue.stats().await.map_err(|e| anyhow::anyhow!(e))?;
            println!("Pending:   {}", stats.pending);
            println!("Leased:    {}", stats.leased);
            println!("Expired:   {}", stats.expired);
            println!("Completed: {}", stats.completed);
            println!("Total:     {}", stats.total());
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and bring the schema up to date.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn cmd_enqueue(queue: &QueueService<PgItemStore>, path: &Path) -> Result<()> {
    let payloads: Vec<ItemPayload> = read_json_file(path)?;
    let ids = queue
        .enqueue(payloads)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(count = ids.len(), "Enqueued items");
    println!("{}", serde_json::to_string_pretty(&ids)?);
    Ok(())
}

async fn cmd_submit(queue: &QueueService<PgItemStore>, path: &Path) -> Result<()> {
    let rows: Vec<ItemResult> = read_json_file(path)?;
    let report = queue
        .submit_results(rows)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    for err in &report.per_item_errors {
        eprintln!("  item {}: {}", err.id, err.reason);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
