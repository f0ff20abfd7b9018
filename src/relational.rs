use crate::constants::TABLE_NAME;
use crate::error::{EtlError, Result};
use crate::frame::TabularDataset;
use crate::types::NormalizedRecord;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

// Identifiers are compile-time constants; no runtime interpolation.
const DROP_TABLE_SQL: &str = "DROP TABLE IF EXISTS meteorite_landings";
const CREATE_TABLE_SQL: &str = "CREATE TABLE meteorite_landings (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    mass REAL NOT NULL,
    year INTEGER NOT NULL,
    reclat REAL NOT NULL,
    reclong REAL NOT NULL
)";
const INSERT_SQL: &str = "INSERT OR IGNORE INTO meteorite_landings
    (id, name, mass, year, reclat, reclong) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const SELECT_ALL_SQL: &str =
    "SELECT id, name, mass, year, reclat, reclong FROM meteorite_landings ORDER BY id";

/// Outcome of a bulk insert. A record whose primary key already exists is
/// skipped, not an error; re-inserting a batch is idempotent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

/// SQLite-backed connector for the fixed `meteorite_landings` table.
///
/// The connection is owned by the store and released when it is dropped,
/// so acquisition stays scoped to the pipeline stage that needs it.
pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            EtlError::Connection(format!("failed to open SQLite db at {}: {e}", path.display()))
        })?;
        debug!("Opened SQLite database at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EtlError::Connection(format!("failed to open in-memory db: {e}")))?;
        Ok(Self { conn })
    }

    /// Drops any prior table and creates the fixed schema, then verifies
    /// creation by reading the table metadata back.
    pub fn create_table(&self) -> Result<()> {
        self.conn
            .execute(DROP_TABLE_SQL, [])
            .map_err(|e| EtlError::Schema(format!("failed to drop prior table: {e}")))?;
        self.conn
            .execute(CREATE_TABLE_SQL, [])
            .map_err(|e| EtlError::Schema(format!("failed to create table: {e}")))?;

        let columns = self.table_columns()?;
        if columns.is_empty() {
            return Err(EtlError::Schema(format!(
                "table '{TABLE_NAME}' has no metadata after creation"
            )));
        }
        info!("Created table '{}' with columns {:?}", TABLE_NAME, columns);
        Ok(())
    }

    fn table_columns(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info('meteorite_landings')")
            .map_err(|e| EtlError::Schema(format!("failed to read table metadata: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| EtlError::Schema(format!("failed to read table metadata: {e}")))?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.map_err(|e| {
                EtlError::Schema(format!("failed to read table metadata: {e}"))
            })?);
        }
        Ok(columns)
    }

    /// Inserts each record, silently skipping primary keys already present.
    pub fn bulk_insert(&self, records: &[NormalizedRecord]) -> Result<InsertOutcome> {
        let mut stmt = self
            .conn
            .prepare(INSERT_SQL)
            .map_err(|e| EtlError::Store(format!("failed to prepare insert: {e}")))?;

        let mut outcome = InsertOutcome::default();
        for record in records {
            let changed = stmt
                .execute(params![
                    record.id,
                    record.name,
                    record.mass,
                    record.year,
                    record.reclat,
                    record.reclong
                ])
                .map_err(|e| {
                    EtlError::Store(format!("failed to insert record id {}: {e}", record.id))
                })?;
            if changed == 0 {
                debug!("Skipped existing record id {}", record.id);
                outcome.skipped += 1;
            } else {
                outcome.inserted += 1;
            }
        }
        info!(
            "Inserted {} records into '{}' ({} already present)",
            outcome.inserted, TABLE_NAME, outcome.skipped
        );
        Ok(outcome)
    }

    /// Full table scan into a typed tabular dataset; column types come from
    /// the schema, not inference.
    pub fn read_all(&self) -> Result<TabularDataset> {
        let mut stmt = self
            .conn
            .prepare(SELECT_ALL_SQL)
            .map_err(|e| EtlError::Store(format!("failed to prepare scan: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(NormalizedRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    mass: row.get(2)?,
                    year: row.get(3)?,
                    reclat: row.get(4)?,
                    reclong: row.get(5)?,
                })
            })
            .map_err(|e| EtlError::Store(format!("failed to scan table: {e}")))?;

        let mut dataset = TabularDataset::new();
        for row in rows {
            let record = row.map_err(|e| EtlError::Store(format!("failed to read row: {e}")))?;
            dataset.push_record(&record);
        }
        info!("Read {} rows from '{}'", dataset.len(), TABLE_NAME);
        Ok(dataset)
    }
}
