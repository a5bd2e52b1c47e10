use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use cotiza_database::{initialize_database, postgres_health_check, DatabaseConfig, PgQuotationStore};
use cotiza_models::QuotationProcess;
use cotiza_quotation_engine::{ManualItemInput, ProcessContext, QuotationEngine, SupplierContext};
use cotiza_utils::{init_logging, AppConfig, CotizaError, CotizaResult, ErrorResponse};

#[derive(Parser, Debug)]
#[command(author, version, about = "Procurement quotation matching and comparison")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a quotation process
    CreateProcess {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "PEN")]
        currency: String,
        /// PEN per USD
        #[arg(short, long)]
        exchange_rate: Option<f64>,
        /// Target margin as a fraction, e.g. 0.12
        #[arg(short, long)]
        target_margin: Option<f64>,
    },
    /// Replace a process's baseline with a budget workbook
    ImportBaseline {
        #[arg(short, long)]
        process: Uuid,
        file: PathBuf,
    },
    /// Import a supplier quote workbook
    ImportQuote {
        #[arg(short, long)]
        process: Uuid,
        #[arg(short, long)]
        supplier: String,
        #[arg(long)]
        tax_id: Option<String>,
        #[arg(short, long, default_value = "")]
        currency: String,
        #[arg(short, long)]
        exchange_rate: Option<f64>,
        /// Re-import into an existing quotation
        #[arg(short, long)]
        quotation: Option<Uuid>,
        file: PathBuf,
    },
    /// Set one baseline row's price on a quotation
    ManualItem {
        #[arg(short, long)]
        quotation: Uuid,
        #[arg(short, long)]
        baseline_item: Uuid,
        #[arg(short, long)]
        unit_price: Option<f64>,
        #[arg(short, long)]
        total_price: Option<f64>,
        #[arg(long)]
        quantity: Option<f64>,
    },
    /// Rankings, per-item comparison and section totals
    Summary {
        #[arg(short, long)]
        process: Uuid,
    },
    /// Ordered and received quantities against the baseline
    Progress {
        #[arg(short, long)]
        process: Uuid,
    },
    /// Delete a process with its baseline, quotations and purchase records
    DeleteProcess {
        #[arg(short, long)]
        process: Uuid,
    },
}

fn print_json<T: Serialize>(value: &T) -> CotizaResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_file(path: &PathBuf) -> CotizaResult<(String, Vec<u8>)> {
    let data = std::fs::read(path)
        .map_err(|e| CotizaError::parse(format!("Failed to read {}: {}", path.display(), e)))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((filename, data))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().unwrap_or_else(|_| {
        eprintln!("Failed to load configuration, using defaults");
        AppConfig::default()
    });
    init_logging(&config.logging)?;

    let db_config = DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: std::time::Duration::from_secs(config.database.connection_timeout_seconds),
    };
    let store = initialize_database(&db_config).await?;
    postgres_health_check(store.pool()).await?;
    info!("Database connection established");

    let engine = QuotationEngine::new(Arc::new(store), &config);

    if let Err(err) = run(&engine, cli.command).await {
        error!(code = err.error_code(), "{}", err);
        eprintln!("{}", serde_json::to_string_pretty(&ErrorResponse::from(err))?);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(engine: &QuotationEngine<PgQuotationStore>, command: Command) -> CotizaResult<()> {
    match command {
        Command::CreateProcess {
            name,
            currency,
            exchange_rate,
            target_margin,
        } => {
            let mut process = QuotationProcess::new(name, currency.to_uppercase());
            process.exchange_rate = exchange_rate;
            process.target_margin_pct = target_margin;
            print_json(&engine.create_process(process).await?)?;
        }
        Command::ImportBaseline { process, file } => {
            let (filename, data) = read_file(&file)?;
            print_json(&engine.import_baseline(process, &filename, &data).await?)?;
        }
        Command::ImportQuote {
            process,
            supplier,
            tax_id,
            currency,
            exchange_rate,
            quotation,
            file,
        } => {
            let (filename, data) = read_file(&file)?;
            let outcome = engine
                .import_supplier_quote(
                    &filename,
                    &data,
                    &ProcessContext {
                        process_id: process,
                        exchange_rate: None,
                    },
                    &SupplierContext {
                        quotation_id: quotation,
                        supplier_name: supplier,
                        supplier_tax_id: tax_id,
                        currency,
                        exchange_rate,
                    },
                )
                .await?;
            print_json(&outcome)?;
        }
        Command::ManualItem {
            quotation,
            baseline_item,
            unit_price,
            total_price,
            quantity,
        } => {
            let input = ManualItemInput {
                baseline_item_id: baseline_item,
                unit_price,
                total_price,
                quantity,
            };
            print_json(&engine.upsert_manual_item(quotation, input).await?)?;
        }
        Command::Summary { process } => {
            print_json(&engine.get_process_summary(process).await?)?;
        }
        Command::Progress { process } => {
            print_json(&engine.get_purchase_progress(process).await?)?;
        }
        Command::DeleteProcess { process } => {
            engine.delete_process(process).await?;
            print_json(&serde_json::json!({ "deleted": process }))?;
        }
    }

    Ok(())
}
