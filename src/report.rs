use crate::error::Result;
use crate::frame::TabularDataset;
use tracing::info;

/// Image artifacts the downstream plotting step produces from the cleaned
/// dataset. Named here as declared outputs; rendering is not this crate's
/// concern.
pub const PLOT_ARTIFACTS: [&str; 6] = [
    "histograms.png",
    "corrColorMatrix.png",
    "scatterMassYear.png",
    "scatterLatYear.png",
    "geospatialMap.png",
    "landingsPerYearLine.png",
];

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0.0 for fewer than
    /// two values.
    pub std_dev: f64,
}

/// Consumes the finalized dataset. Implementations must not mutate it;
/// the pipeline hands it over only after cleaning and export verification.
pub trait ReportingSink {
    fn consume(&self, dataset: &TabularDataset) -> Result<()>;
}

/// Default sink: logs descriptive statistics and the declared plot outputs.
pub struct LogSummarySink;

impl ReportingSink for LogSummarySink {
    fn consume(&self, dataset: &TabularDataset) -> Result<()> {
        for summary in summarize(dataset) {
            info!(
                "{}: count={} min={} max={} mean={} std={}",
                summary.column,
                summary.count,
                summary.min,
                summary.max,
                summary.mean,
                summary.std_dev
            );
        }
        for (id, name, mass) in largest_by_mass(dataset, 3) {
            info!("Largest landing: id={} name={:?} mass={}", id, name, mass);
        }
        info!("Plot artifacts to be produced: {:?}", PLOT_ARTIFACTS);
        Ok(())
    }
}

/// Per-column descriptive statistics over the numeric columns.
pub fn summarize(dataset: &TabularDataset) -> Vec<ColumnSummary> {
    let mut summaries = Vec::new();
    for (col, spec) in dataset.columns().iter().enumerate() {
        if !spec.ty.is_numeric() {
            continue;
        }
        let values = dataset.column_f64(col);
        if values.is_empty() {
            continue;
        }
        let count = values.len();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };
        summaries.push(ColumnSummary {
            column: spec.name.clone(),
            count,
            min,
            max,
            mean,
            std_dev,
        });
    }
    summaries
}

/// The `n` heaviest landings as `(id, name, mass)`, heaviest first.
pub fn largest_by_mass(dataset: &TabularDataset, n: usize) -> Vec<(i64, String, f64)> {
    let Some(mass_col) = dataset.column_index("mass") else {
        return Vec::new();
    };
    let name_col = dataset.column_index("name");

    let mut landings: Vec<(i64, String, f64)> = (0..dataset.len())
        .filter_map(|row| {
            let mass = dataset.value(row, mass_col).as_f64()?;
            let name = name_col
                .and_then(|col| match dataset.value(row, col) {
                    crate::frame::CellValue::Text(s) => Some(s.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            Some((dataset.ids()[row], name, mass))
        })
        .collect();
    landings.sort_by(|a, b| b.2.total_cmp(&a.2));
    landings.truncate(n);
    landings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalizedRecord;

    fn dataset() -> TabularDataset {
        let mut ds = TabularDataset::new();
        for (id, name, mass, year) in [
            (1, "A", 10.0, 2000),
            (2, "B", 20.0, 2002),
            (3, "C", 30.0, 2004),
        ] {
            ds.push_record(&NormalizedRecord {
                id,
                name: name.to_string(),
                mass,
                year,
                reclat: 0.0,
                reclong: 0.0,
            });
        }
        ds
    }

    #[test]
    fn summary_covers_numeric_columns_only() {
        let summaries = summarize(&dataset());
        let columns: Vec<_> = summaries.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(columns, vec!["mass", "year", "reclat", "reclong"]);
    }

    #[test]
    fn summary_statistics_match_hand_computed_values() {
        let summaries = summarize(&dataset());
        let mass = summaries.iter().find(|s| s.column == "mass").unwrap();
        assert_eq!(mass.count, 3);
        assert_eq!(mass.min, 10.0);
        assert_eq!(mass.max, 30.0);
        assert_eq!(mass.mean, 20.0);
        assert_eq!(mass.std_dev, 10.0);
    }

    #[test]
    fn largest_by_mass_is_sorted_descending() {
        let top = largest_by_mass(&dataset(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 3);
        assert_eq!(top[1].0, 2);
    }
}
