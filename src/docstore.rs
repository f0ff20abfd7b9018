use crate::config::ConnectionDescriptor;
use crate::error::{EtlError, Result};
use crate::types::RawRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Declarative query filter, evaluated inside the store rather than by the
/// caller. Clauses mirror the document-store predicates the extract query
/// needs: field existence and field inequality.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
enum Clause {
    Exists(String),
    NotEqual(String, Value),
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(mut self, field: &str) -> Self {
        self.clauses.push(Clause::Exists(field.to_string()));
        self
    }

    pub fn not_equal(mut self, field: &str, value: Value) -> Self {
        self.clauses.push(Clause::NotEqual(field.to_string(), value));
        self
    }

    fn matches(&self, doc: &RawRecord) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Exists(field) => doc.contains_key(field),
            // An absent field is "not equal", matching document-store semantics.
            Clause::NotEqual(field, value) => doc.get(field) != Some(value),
        })
    }
}

/// Field-selection projection. An empty projection returns documents
/// unmodified; otherwise only the listed fields are returned.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, field: &str) -> Self {
        self.fields.push(field.to_string());
        self
    }

    fn apply(&self, doc: &RawRecord) -> RawRecord {
        if self.fields.is_empty() {
            return doc.clone();
        }
        self.fields
            .iter()
            .filter_map(|field| doc.get(field).map(|value| (field.clone(), value.clone())))
            .collect()
    }
}

/// Outcome of a collection load.
#[derive(Debug, Clone, Copy)]
pub struct InsertResult {
    pub inserted: usize,
    /// Whether a prior copy of the collection was dropped first.
    pub replaced_existing: bool,
}

/// Connector interface for the document store.
///
/// `load` has drop-and-replace semantics: repeated loads of the same batch
/// leave the store in the same state. `query` evaluates the filter and
/// projection store-side; an empty result is not an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, collection: &str, records: &[RawRecord]) -> Result<InsertResult>;

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> Result<Vec<RawRecord>>;
}

/// In-memory document store used as the default backend and in tests.
pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<HashMap<String, Vec<RawRecord>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// "Connects" using the opaque descriptor, rejecting URIs this backend
    /// cannot serve. Connectivity problems surface here, distinct from
    /// write-time store failures.
    pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        if descriptor.as_uri().is_empty() {
            return Err(EtlError::Connection("empty connection URI".into()));
        }
        info!("Connected to document store");
        Ok(Self::new())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self, collection: &str, records: &[RawRecord]) -> Result<InsertResult> {
        if records.is_empty() {
            return Err(EtlError::Store(format!(
                "refusing to load empty batch into '{collection}'"
            )));
        }

        let mut collections = self.collections.lock().unwrap();
        let replaced_existing = collections.remove(collection).is_some();
        if replaced_existing {
            debug!("Dropped prior contents of collection '{}'", collection);
        }
        collections.insert(collection.to_string(), records.to_vec());

        info!(
            "Inserted {} documents into collection '{}'",
            records.len(),
            collection
        );
        Ok(InsertResult {
            inserted: records.len(),
            replaced_existing,
        })
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> Result<Vec<RawRecord>> {
        let collections = self.collections.lock().unwrap();
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            // Matching nothing is an empty result, not an error.
            None => return Ok(Vec::new()),
        };

        let results: Vec<RawRecord> = docs
            .iter()
            .filter(|doc| filter.matches(doc))
            .map(|doc| projection.apply(doc))
            .collect();
        debug!(
            "Query on '{}' matched {} of {} documents",
            collection,
            results.len(),
            docs.len()
        );
        Ok(results)
    }
}
