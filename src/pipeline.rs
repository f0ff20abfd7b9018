use crate::cleaning::{self, CleaningReport};
use crate::config::Config;
use crate::constants::{CSV_EXPORT_PREFIX, RAW_DUMP_FILENAME};
use crate::docstore::{DocumentStore, Filter, Projection};
use crate::error::{EtlError, Result};
use crate::fetcher::{self, Fetcher};
use crate::frame::TabularDataset;
use crate::normalize;
use crate::relational::{InsertOutcome, RelationalStore};
use crate::report::ReportingSink;
use crate::types::{NormalizedRecord, RawRecord};
use chrono::Utc;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Summary of the ingest half of a run: fetch, load, extract, persist.
#[derive(Debug)]
pub struct IngestSummary {
    pub fetched: usize,
    pub invalid_ids_skipped: usize,
    pub loaded: usize,
    pub extracted: usize,
    pub insert: InsertOutcome,
}

/// Summary of the cleaning half: read, clean, export, verify.
#[derive(Debug)]
pub struct CleanSummary {
    pub rows_read: usize,
    pub report: CleaningReport,
    pub csv_path: String,
}

#[derive(Debug)]
pub struct PipelineResult {
    pub ingest: IngestSummary,
    pub clean: CleanSummary,
}

/// Explicit pipeline driver. Owns the dataset value and threads it through
/// each stage in sequence; any stage failure aborts the run with nothing
/// committed downstream of the failing stage.
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The canonical extract query: documents with a recorded mass that
    /// were observed falling, projected onto the six analysis fields.
    fn extract_filter() -> Filter {
        Filter::new().exists("mass").not_equal("fall", json!("Found"))
    }

    fn extract_projection() -> Projection {
        Projection::new()
            .include("id")
            .include("name")
            .include("mass")
            .include("year")
            .include("reclat")
            .include("reclong")
    }

    /// Fetches the raw collection and writes the intermediate JSON dump.
    pub async fn fetch_raw(&self) -> Result<Vec<RawRecord>> {
        let fetcher = Fetcher::new(Duration::from_secs(self.config.source.timeout_seconds))?;
        let records = fetcher.fetch(&self.config.source.url).await?;

        let dump_path = Path::new(&self.config.output.dir).join(RAW_DUMP_FILENAME);
        fetcher::write_json_dump(&records, &dump_path)?;
        Ok(records)
    }

    /// Standalone load stage: re-reads the raw dump left by a prior fetch
    /// and runs the ingest from it.
    pub async fn load_from_dump(&self, store: &dyn DocumentStore) -> Result<IngestSummary> {
        let dump_path = Path::new(&self.config.output.dir).join(RAW_DUMP_FILENAME);
        let records = fetcher::read_json_dump(&dump_path)?;
        self.ingest(records, store).await
    }

    /// Loads raw records into the document store, extracts the analysis
    /// subset, normalizes it, and persists it to the relational table.
    #[instrument(skip(self, records, store))]
    pub async fn ingest(
        &self,
        records: Vec<RawRecord>,
        store: &dyn DocumentStore,
    ) -> Result<IngestSummary> {
        let fetched = records.len();

        // Records without a usable id are invalid and excluded upstream of
        // any store.
        let mut valid = Vec::with_capacity(records.len());
        let mut invalid_ids_skipped = 0;
        for record in records {
            match normalize::validate_id(&record) {
                Ok(_) => valid.push(record),
                Err(e) => {
                    warn!("Excluding record: {}", e);
                    invalid_ids_skipped += 1;
                }
            }
        }

        let collection = &self.config.docstore.collection;
        let load = store.load(collection, &valid).await?;
        info!(
            "Loaded {} documents into '{}' (replaced prior contents: {})",
            load.inserted, collection, load.replaced_existing
        );

        let extracted = store
            .query(collection, &Self::extract_filter(), &Self::extract_projection())
            .await?;
        if extracted.is_empty() {
            return Err(EtlError::Verification(
                "extract query matched no documents".into(),
            ));
        }
        info!("Extracted {} documents from '{}'", extracted.len(), collection);

        let normalized: Vec<NormalizedRecord> = extracted
            .iter()
            .map(normalize::to_normalized)
            .collect::<Result<_>>()?;

        // Relational connection is scoped to this stage and released with it.
        let insert = {
            let relational = RelationalStore::open(&self.config.relational.db_path)?;
            relational.create_table()?;
            relational.bulk_insert(&normalized)?
        };

        Ok(IngestSummary {
            fetched,
            invalid_ids_skipped,
            loaded: load.inserted,
            extracted: extracted.len(),
            insert,
        })
    }

    /// Reads the relational table, runs the cleaning passes, exports the
    /// timestamped CSV, and verifies the export round-trips exactly before
    /// handing the dataset to the reporting sink.
    #[instrument(skip(self, sink))]
    pub fn clean_stage(&self, sink: &dyn ReportingSink) -> Result<CleanSummary> {
        let dataset = {
            let relational = RelationalStore::open(&self.config.relational.db_path)?;
            relational.read_all()?
        };
        let rows_read = dataset.len();

        let (cleaned, report) = cleaning::clean(dataset)?;

        let csv_path = self.export_verified(&cleaned)?;
        sink.consume(&cleaned)?;

        Ok(CleanSummary {
            rows_read,
            report,
            csv_path,
        })
    }

    /// Writes the cleaned CSV and proves the round-trip: reading it back
    /// under the declared column types must reproduce the dataset exactly.
    /// A failed check removes the file; no degraded export is left behind.
    fn export_verified(&self, dataset: &TabularDataset) -> Result<String> {
        fs::create_dir_all(&self.config.output.dir)?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{CSV_EXPORT_PREFIX}_{timestamp}.csv");
        let csv_path = Path::new(&self.config.output.dir).join(filename);

        dataset.write_csv(&csv_path)?;

        let readback = TabularDataset::read_csv(&csv_path)?;
        if &readback != dataset {
            let _ = fs::remove_file(&csv_path);
            return Err(EtlError::Verification(format!(
                "CSV read-back does not match the in-memory dataset: {}",
                csv_path.display()
            )));
        }
        info!("Verified CSV export at {}", csv_path.display());
        Ok(csv_path.to_string_lossy().to_string())
    }

    /// Full run: fetch, ingest, clean. Each stage completes before the next
    /// begins; the first failure terminates the run.
    pub async fn run(
        &self,
        store: &dyn DocumentStore,
        sink: &dyn ReportingSink,
    ) -> Result<PipelineResult> {
        let records = self.fetch_raw().await?;
        let ingest = self.ingest(records, store).await?;
        let clean = self.clean_stage(sink)?;
        Ok(PipelineResult { ingest, clean })
    }
}
