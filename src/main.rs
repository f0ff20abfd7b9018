use clap::{Parser, Subcommand};
use tracing::error;

mod cleaning;
mod config;
mod constants;
mod docstore;
mod error;
mod fetcher;
mod frame;
mod logging;
mod normalize;
mod pipeline;
mod relational;
mod report;
mod types;

use crate::config::{Config, ConnectionDescriptor};
use crate::docstore::InMemoryDocumentStore;
use crate::pipeline::Pipeline;
use crate::report::LogSummarySink;

#[derive(Parser)]
#[command(name = "meteorite_etl")]
#[command(about = "Meteorite landings ETL and cleaning pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the raw collection and write the intermediate JSON dump
    Fetch,
    /// Load a previously fetched dump into the stores
    Load,
    /// Clean the persisted table and export the verified CSV
    Clean,
    /// Run the full pipeline: fetch, load, extract, clean, export
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Fetch => {
            println!("📡 Fetching raw collection...");
            match pipeline.fetch_raw().await {
                Ok(records) => {
                    println!("✅ Fetched {} documents", records.len());
                }
                Err(e) => {
                    error!("Fetch failed: {}", e);
                    println!("❌ Fetch failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Load => {
            println!("📥 Loading raw dump into the stores...");
            let descriptor = ConnectionDescriptor::from_env(&pipeline.config().docstore)?;
            let store = InMemoryDocumentStore::connect(&descriptor)?;

            match pipeline.load_from_dump(&store).await {
                Ok(summary) => {
                    println!("✅ Load completed");
                    println!("   Invalid ids skipped: {}", summary.invalid_ids_skipped);
                    println!("   Loaded to document store: {}", summary.loaded);
                    println!("   Extracted: {}", summary.extracted);
                    println!(
                        "   Persisted: {} ({} already present)",
                        summary.insert.inserted, summary.insert.skipped
                    );
                }
                Err(e) => {
                    error!("Load failed: {}", e);
                    println!("❌ Load failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Clean => {
            println!("🧹 Cleaning persisted dataset...");
            match pipeline.clean_stage(&LogSummarySink) {
                Ok(summary) => {
                    println!("✅ Cleaning completed");
                    println!("   Rows read: {}", summary.rows_read);
                    println!("   Rows after cleaning: {}", summary.report.rows_after);
                    println!("   Output file: {}", summary.csv_path);
                }
                Err(e) => {
                    error!("Cleaning failed: {}", e);
                    println!("❌ Cleaning failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Run => {
            println!("🚀 Running full pipeline...");
            let descriptor = ConnectionDescriptor::from_env(&pipeline.config().docstore)?;
            let store = InMemoryDocumentStore::connect(&descriptor)?;

            match pipeline.run(&store, &LogSummarySink).await {
                Ok(result) => {
                    println!("\n📊 Pipeline Results:");
                    println!("   Fetched: {}", result.ingest.fetched);
                    println!("   Invalid ids skipped: {}", result.ingest.invalid_ids_skipped);
                    println!("   Loaded to document store: {}", result.ingest.loaded);
                    println!("   Extracted: {}", result.ingest.extracted);
                    println!(
                        "   Persisted: {} ({} already present)",
                        result.ingest.insert.inserted, result.ingest.insert.skipped
                    );
                    println!("   Rows after cleaning: {}", result.clean.report.rows_after);
                    println!("   Output file: {}", result.clean.csv_path);
                    println!("✅ Full pipeline completed successfully!");
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    println!("❌ Pipeline failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
