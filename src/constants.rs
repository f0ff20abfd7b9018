/// NASA open-data endpoint serving the full meteorite landings collection
/// as a single JSON array.
pub const DEFAULT_SOURCE_URL: &str = "https://data.nasa.gov/resource/y77d-th95.json";

/// Document store collection holding the raw fetched documents.
pub const COLLECTION_NAME: &str = "meteorite_landings";

/// Relational table holding the normalized records. Fixed at compile time;
/// identifiers are never built from runtime input.
pub const TABLE_NAME: &str = "meteorite_landings";

/// Filename of the intermediate raw JSON dump.
pub const RAW_DUMP_FILENAME: &str = "meteorite_raw.json";

/// Prefix for the timestamped cleaned CSV export.
pub const CSV_EXPORT_PREFIX: &str = "meteorite_clean";
