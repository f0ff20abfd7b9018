use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("source returned HTTP {status}")]
    Network { status: u16 },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("malformed date string: {0:?}")]
    MalformedDate(String),

    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store write rejected: {0}")]
    Store(String),

    #[error("table creation failed: {0}")]
    Schema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("verification failed: {0}")]
    Verification(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
