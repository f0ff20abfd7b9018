use crate::error::{EtlError, Result};
use crate::types::RawRecord;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Retrieves the document collection from the remote source.
///
/// One GET per call; success is exactly HTTP 200 and a body that
/// deserializes as a JSON array of objects. No retries and no state
/// retained between invocations.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<RawRecord>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(EtlError::Network {
                status: status.as_u16(),
            });
        }

        // Deserializing into maps enforces "array of objects" up front.
        let records: Vec<RawRecord> = response.json().await?;
        info!("Retrieved {} documents from {}", records.len(), url);
        Ok(records)
    }
}

/// Writes the raw fetched collection to a pretty-printed JSON file, the
/// intermediate artifact kept alongside the store loads.
pub fn write_json_dump<P: AsRef<Path>>(records: &[RawRecord], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json_content = serde_json::to_string_pretty(records)?;
    fs::write(path, json_content)?;
    info!("Wrote {} raw documents to {}", records.len(), path.display());
    Ok(())
}

/// Reads a raw collection dump written by [`write_json_dump`], so the load
/// stage can run standalone from a prior fetch.
pub fn read_json_dump<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let records: Vec<RawRecord> = serde_json::from_str(&content)?;
    info!("Read {} raw documents from {}", records.len(), path.display());
    Ok(records)
}
