use serde::{Deserialize, Serialize};

/// Raw document as returned from the external source. Schema is not
/// guaranteed; fields are optional except a unique identifier.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A raw record coerced into the fixed six-field analysis schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: i64,
    pub name: String,
    pub mass: f64,
    pub year: i64,
    pub reclat: f64,
    pub reclong: f64,
}
