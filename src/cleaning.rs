use crate::error::{EtlError, Result};
use crate::frame::{CellValue, ColumnType, TabularDataset};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How the missing-value pass resolves missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Drop every row with any missing value.
    DeleteRows,
    /// Substitute the column mean into numeric columns; non-numeric
    /// columns are carried through unmodified.
    SubstituteMean,
}

/// Outcome of the missing-value pass. "Nothing to do" is distinct from
/// "found and handled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingOutcome {
    Clean,
    RowsDropped(usize),
    CellsFilled {
        filled: usize,
        /// Missing cells in non-numeric columns, which substitution mode
        /// leaves in place.
        unresolved_text_cells: usize,
    },
}

/// Outcome of the duplicate pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateOutcome {
    Clean,
    Removed(usize),
}

/// Inclusive value bounds for one column.
#[derive(Debug, Clone)]
pub struct ColumnBound {
    pub column: String,
    pub min: f64,
    pub max: f64,
    /// Delete out-of-range rows instead of clamping their values.
    pub delete_out_of_range: bool,
}

impl ColumnBound {
    pub fn clamp(column: &str, min: f64, max: f64) -> Self {
        Self {
            column: column.to_string(),
            min,
            max,
            delete_out_of_range: false,
        }
    }

    pub fn delete(column: &str, min: f64, max: f64) -> Self {
        Self {
            column: column.to_string(),
            min,
            max,
            delete_out_of_range: true,
        }
    }
}

/// The static bounds table for a run. Only `year` uses delete semantics;
/// the order is the order the passes apply in.
pub fn default_bounds() -> Vec<ColumnBound> {
    vec![
        ColumnBound::clamp("reclong", -180.0, 180.0),
        ColumnBound::clamp("reclat", -90.0, 90.0),
        ColumnBound::delete("year", 861.0, 2016.0),
        ColumnBound::clamp("mass", 0.0, 750_000.0),
    ]
}

/// Per-bound effect of the range pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundOutcome {
    pub column: String,
    /// Values clamped to the nearest bound (clamp mode).
    pub clamped: usize,
    /// Rows removed for being out of range (delete mode).
    pub deleted: usize,
}

/// Summary of everything the cleaning run changed.
#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub missing_before: Vec<(String, usize)>,
    pub missing: MissingOutcome,
    pub duplicates: DuplicateOutcome,
    pub bounds: Vec<BoundOutcome>,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Missing-value pass. Counts missing values per column; if none, this is
/// a no-op. Otherwise rows are dropped or numeric cells are filled with
/// the column mean (computed over the non-missing values), per policy.
pub fn handle_missing(
    dataset: &mut TabularDataset,
    policy: MissingPolicy,
) -> Result<MissingOutcome> {
    let counts = dataset.missing_counts();
    for (column, count) in &counts {
        if *count > 0 {
            debug!("Column '{}' has {} missing values", column, count);
        }
    }
    if counts.iter().all(|(_, count)| *count == 0) {
        info!("No missing values found");
        return Ok(MissingOutcome::Clean);
    }

    let outcome = match policy {
        MissingPolicy::DeleteRows => {
            let before = dataset.len();
            let keep: Vec<bool> = (0..dataset.len())
                .map(|row| !dataset.row(row).iter().any(CellValue::is_null))
                .collect();
            dataset.retain_rows(|row| keep[row]);
            let dropped = before - dataset.len();
            info!("Dropped {} rows with missing values", dropped);
            MissingOutcome::RowsDropped(dropped)
        }
        MissingPolicy::SubstituteMean => {
            let mut filled = 0;
            let mut unresolved_text_cells = 0;
            for col in 0..dataset.columns().len() {
                let count = counts[col].1;
                if count == 0 {
                    continue;
                }
                let name = dataset.columns()[col].name.clone();
                let ty = dataset.columns()[col].ty;
                if !ty.is_numeric() {
                    unresolved_text_cells += count;
                    warn!(
                        "Column '{}' has {} missing values but is not numeric; leaving unmodified",
                        name, count
                    );
                    continue;
                }
                let mean = dataset.column_mean(col).ok_or_else(|| {
                    EtlError::Verification(format!(
                        "column '{name}' has no values to compute a mean from"
                    ))
                })?;
                let replacement = match ty {
                    ColumnType::Integer => CellValue::Int(mean.round() as i64),
                    ColumnType::Float => CellValue::Float(mean),
                    ColumnType::Text => unreachable!("non-numeric columns skipped above"),
                };
                for row in 0..dataset.len() {
                    if dataset.value(row, col).is_null() {
                        dataset.set_value(row, col, replacement.clone());
                        filled += 1;
                    }
                }
                info!(
                    "Filled {} missing values in column '{}' with mean {}",
                    count, name, mean
                );
            }
            MissingOutcome::CellsFilled {
                filled,
                unresolved_text_cells,
            }
        }
    };

    // Post-condition: numeric columns must be fully populated now.
    let remaining: usize = dataset
        .missing_counts()
        .iter()
        .enumerate()
        .filter(|(col, _)| dataset.columns()[*col].ty.is_numeric())
        .map(|(_, (_, count))| *count)
        .sum();
    if remaining > 0 {
        return Err(EtlError::Verification(format!(
            "{remaining} missing numeric values remain after the missing-value pass"
        )));
    }

    Ok(outcome)
}

/// Duplicate pass. A row is a duplicate when it is value-identical to
/// another row across all data columns (the `id` index does not
/// participate). The first-seen copy survives.
pub fn handle_duplicates(dataset: &mut TabularDataset) -> DuplicateOutcome {
    let mut seen: HashMap<Vec<CellKey>, usize> = HashMap::new();
    let mut keep = vec![true; dataset.len()];
    let mut removed = 0;

    for row in 0..dataset.len() {
        let key: Vec<CellKey> = dataset.row(row).iter().map(CellKey::from).collect();
        match seen.get(&key) {
            Some(first) => {
                debug!(
                    "Row id {} duplicates row id {}",
                    dataset.ids()[row],
                    dataset.ids()[*first]
                );
                keep[row] = false;
                removed += 1;
            }
            None => {
                seen.insert(key, row);
            }
        }
    }

    if removed == 0 {
        info!("No duplicate rows found");
        return DuplicateOutcome::Clean;
    }

    dataset.retain_rows(|row| keep[row]);
    info!("Removed {} duplicate rows", removed);
    DuplicateOutcome::Removed(removed)
}

/// Range pass for one bound: delete mode removes every row whose value is
/// outside `[min, max]`; clamp mode replaces out-of-range values with the
/// nearest bound and reports how many rows were modified.
pub fn apply_bound(dataset: &mut TabularDataset, bound: &ColumnBound) -> Result<BoundOutcome> {
    let col = dataset.column_index(&bound.column).ok_or_else(|| {
        EtlError::Config(format!("bounds refer to unknown column '{}'", bound.column))
    })?;

    let mut outcome = BoundOutcome {
        column: bound.column.clone(),
        clamped: 0,
        deleted: 0,
    };

    if bound.delete_out_of_range {
        let before = dataset.len();
        let keep: Vec<bool> = (0..dataset.len())
            .map(|row| match dataset.value(row, col).as_f64() {
                Some(v) => v >= bound.min && v <= bound.max,
                // A missing value cannot be shown in range; the row goes.
                None => false,
            })
            .collect();
        dataset.retain_rows(|row| keep[row]);
        outcome.deleted = before - dataset.len();
        info!(
            "Deleted {} rows with '{}' outside [{}, {}]",
            outcome.deleted, bound.column, bound.min, bound.max
        );
    } else {
        for row in 0..dataset.len() {
            let Some(v) = dataset.value(row, col).as_f64() else {
                continue;
            };
            if v < bound.min || v > bound.max {
                let clamped = v.clamp(bound.min, bound.max);
                let cell = match dataset.columns()[col].ty {
                    ColumnType::Integer => CellValue::Int(clamped.round() as i64),
                    _ => CellValue::Float(clamped),
                };
                dataset.set_value(row, col, cell);
                outcome.clamped += 1;
            }
        }
        info!(
            "Clamped {} values in '{}' to [{}, {}]",
            outcome.clamped, bound.column, bound.min, bound.max
        );
    }

    Ok(outcome)
}

/// Runs all bounds in table order.
pub fn apply_bounds(
    dataset: &mut TabularDataset,
    bounds: &[ColumnBound],
) -> Result<Vec<BoundOutcome>> {
    bounds
        .iter()
        .map(|bound| apply_bound(dataset, bound))
        .collect()
}

/// Cleaning driver: missing values (substitution mode), then duplicates,
/// then the static bounds table. Each pass's effects are permanent; there
/// is no retry or rollback.
pub fn clean(mut dataset: TabularDataset) -> Result<(TabularDataset, CleaningReport)> {
    let rows_before = dataset.len();
    let missing_before = dataset.missing_counts();

    let missing = handle_missing(&mut dataset, MissingPolicy::SubstituteMean)?;
    let duplicates = handle_duplicates(&mut dataset);
    let bounds = apply_bounds(&mut dataset, &default_bounds())?;

    let report = CleaningReport {
        missing_before,
        missing,
        duplicates,
        bounds,
        rows_before,
        rows_after: dataset.len(),
    };
    info!(
        "Cleaning finished: {} rows in, {} rows out",
        report.rows_before, report.rows_after
    );
    Ok((dataset, report))
}

/// Hashable key for duplicate detection; floats compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Int(i64),
    Float(u64),
    Text(String),
    Null,
}

impl From<&CellValue> for CellKey {
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Int(v) => CellKey::Int(*v),
            // Adding 0.0 collapses -0.0 into 0.0 so the signed zeros key
            // identically, as value equality requires.
            CellValue::Float(v) => CellKey::Float((*v + 0.0).to_bits()),
            CellValue::Text(s) => CellKey::Text(s.clone()),
            CellValue::Null => CellKey::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NormalizedRecord;

    fn record(id: i64, name: &str, mass: f64, year: i64, reclat: f64, reclong: f64) -> NormalizedRecord {
        NormalizedRecord {
            id,
            name: name.to_string(),
            mass,
            year,
            reclat,
            reclong,
        }
    }

    fn full_dataset() -> TabularDataset {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 100.0, 1990, 10.0, 20.0));
        ds.push_record(&record(2, "B", 200.0, 2000, -10.0, -20.0));
        ds.push_record(&record(3, "C", 300.0, 2010, 45.0, 90.0));
        ds
    }

    #[test]
    fn missing_pass_is_noop_on_full_dataset() {
        let mut ds = full_dataset();
        let before = ds.clone();
        let outcome = handle_missing(&mut ds, MissingPolicy::SubstituteMean).unwrap();
        assert_eq!(outcome, MissingOutcome::Clean);
        assert_eq!(ds, before);
    }

    #[test]
    fn substitute_mode_fills_numeric_columns_with_mean() {
        let mut ds = full_dataset();
        ds.push_row(
            4,
            vec![
                CellValue::Text("D".into()),
                CellValue::Null,
                CellValue::Int(2005),
                CellValue::Float(0.0),
                CellValue::Float(0.0),
            ],
        )
        .unwrap();

        let outcome = handle_missing(&mut ds, MissingPolicy::SubstituteMean).unwrap();
        assert_eq!(
            outcome,
            MissingOutcome::CellsFilled {
                filled: 1,
                unresolved_text_cells: 0
            }
        );
        let mass = ds.column_index("mass").unwrap();
        assert_eq!(ds.value(3, mass), &CellValue::Float(200.0));
    }

    #[test]
    fn substitute_mode_rounds_integer_column_mean() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 1.0, 1999, 0.0, 0.0));
        ds.push_record(&record(2, "B", 2.0, 2000, 0.0, 0.0));
        ds.push_row(
            3,
            vec![
                CellValue::Text("C".into()),
                CellValue::Float(3.0),
                CellValue::Null,
                CellValue::Float(0.0),
                CellValue::Float(0.0),
            ],
        )
        .unwrap();

        handle_missing(&mut ds, MissingPolicy::SubstituteMean).unwrap();
        let year = ds.column_index("year").unwrap();
        // mean(1999, 2000) = 1999.5, rounds away from zero
        assert_eq!(ds.value(2, year), &CellValue::Int(2000));
    }

    #[test]
    fn substitute_mode_leaves_text_columns_alone() {
        let mut ds = full_dataset();
        ds.push_row(
            4,
            vec![
                CellValue::Null,
                CellValue::Float(1.0),
                CellValue::Int(2001),
                CellValue::Float(0.0),
                CellValue::Float(0.0),
            ],
        )
        .unwrap();

        let outcome = handle_missing(&mut ds, MissingPolicy::SubstituteMean).unwrap();
        assert_eq!(
            outcome,
            MissingOutcome::CellsFilled {
                filled: 0,
                unresolved_text_cells: 1
            }
        );
        let name = ds.column_index("name").unwrap();
        assert!(ds.value(3, name).is_null());
    }

    #[test]
    fn delete_mode_drops_rows_with_any_missing_cell() {
        let mut ds = full_dataset();
        ds.push_row(
            4,
            vec![
                CellValue::Text("D".into()),
                CellValue::Null,
                CellValue::Int(2005),
                CellValue::Float(0.0),
                CellValue::Float(0.0),
            ],
        )
        .unwrap();

        let outcome = handle_missing(&mut ds, MissingPolicy::DeleteRows).unwrap();
        assert_eq!(outcome, MissingOutcome::RowsDropped(1));
        assert_eq!(ds.ids(), &[1, 2, 3]);
    }

    #[test]
    fn duplicates_collapse_to_first_seen() {
        let mut ds = full_dataset();
        // Same values as id 1 under a different id: still a duplicate,
        // the index does not participate in row identity.
        ds.push_record(&record(9, "A", 100.0, 1990, 10.0, 20.0));
        ds.push_record(&record(10, "A", 100.0, 1990, 10.0, 20.0));

        let outcome = handle_duplicates(&mut ds);
        assert_eq!(outcome, DuplicateOutcome::Removed(2));
        assert_eq!(ds.ids(), &[1, 2, 3]);
    }

    #[test]
    fn negative_zero_coordinates_duplicate_positive_zero() {
        let mut ds = TabularDataset::new();
        // The source records equatorial coordinates as -0.000000
        ds.push_record(&record(1, "A", 100.0, 1990, 0.0, 0.0));
        ds.push_record(&record(2, "A", 100.0, 1990, -0.0, -0.0));

        let outcome = handle_duplicates(&mut ds);
        assert_eq!(outcome, DuplicateOutcome::Removed(1));
        assert_eq!(ds.ids(), &[1]);
    }

    #[test]
    fn duplicate_pass_is_noop_without_duplicates() {
        let mut ds = full_dataset();
        let before = ds.clone();
        assert_eq!(handle_duplicates(&mut ds), DuplicateOutcome::Clean);
        assert_eq!(ds, before);
    }

    #[test]
    fn clamp_bound_replaces_with_nearest_edge() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 1_000_000.0, 2000, 0.0, 0.0));
        ds.push_record(&record(2, "B", -5.0, 2000, 0.0, 0.0));
        ds.push_record(&record(3, "C", 500.0, 2000, 0.0, 0.0));

        let outcome = apply_bound(&mut ds, &ColumnBound::clamp("mass", 0.0, 750_000.0)).unwrap();
        assert_eq!(outcome.clamped, 2);
        let mass = ds.column_index("mass").unwrap();
        assert_eq!(ds.value(0, mass), &CellValue::Float(750_000.0));
        assert_eq!(ds.value(1, mass), &CellValue::Float(0.0));
        assert_eq!(ds.value(2, mass), &CellValue::Float(500.0));
    }

    #[test]
    fn clamp_keeps_inclusive_edges() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 0.0, 2000, -90.0, 180.0));
        let outcomes = apply_bounds(&mut ds, &default_bounds()).unwrap();
        assert!(outcomes.iter().all(|o| o.clamped == 0 && o.deleted == 0));
    }

    #[test]
    fn integer_clamp_rounds_fractional_bounds() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 1.0, 500, 0.0, 0.0));

        let outcome = apply_bound(&mut ds, &ColumnBound::clamp("year", 861.6, 2016.0)).unwrap();
        assert_eq!(outcome.clamped, 1);
        let year = ds.column_index("year").unwrap();
        assert_eq!(ds.value(0, year), &CellValue::Int(862));
    }

    #[test]
    fn delete_bound_removes_out_of_range_rows() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 1.0, 1700, 0.0, 0.0));
        ds.push_record(&record(2, "B", 1.0, 0, 0.0, 0.0));
        ds.push_record(&record(3, "C", 1.0, 2017, 0.0, 0.0));

        let outcome = apply_bound(&mut ds, &ColumnBound::delete("year", 861.0, 2016.0)).unwrap();
        assert_eq!(outcome.deleted, 2);
        assert_eq!(ds.ids(), &[1]);
    }

    #[test]
    fn unknown_bound_column_is_a_config_error() {
        let mut ds = full_dataset();
        let result = apply_bound(&mut ds, &ColumnBound::clamp("velocity", 0.0, 1.0));
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn bounds_invariant_holds_after_clean() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 1_000_000.0, 1700, 95.0, -200.0));
        ds.push_record(&record(2, "B", 50.0, 500, 10.0, 10.0));
        ds.push_record(&record(3, "C", 50.0, 2000, 10.0, 10.0));

        let (cleaned, report) = clean(ds).unwrap();

        for bound in default_bounds() {
            let col = cleaned.column_index(&bound.column).unwrap();
            for row in 0..cleaned.len() {
                let v = cleaned.value(row, col).as_f64().unwrap();
                assert!(v >= bound.min && v <= bound.max);
            }
        }
        // id 2's year 500 is outside [861, 2016] and the row is gone
        assert_eq!(cleaned.ids(), &[1, 3]);
        assert_eq!(report.rows_before, 3);
        assert_eq!(report.rows_after, 2);
    }

    #[test]
    fn cleaning_is_a_fixed_point() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 1_000_000.0, 1700, 95.0, -200.0));
        ds.push_record(&record(2, "B", 50.0, 2000, 10.0, 10.0));
        ds.push_record(&record(3, "B", 50.0, 2000, 10.0, 10.0));

        let (cleaned, _) = clean(ds).unwrap();
        let (cleaned_again, report) = clean(cleaned.clone()).unwrap();

        assert_eq!(cleaned_again, cleaned);
        assert_eq!(report.missing, MissingOutcome::Clean);
        assert_eq!(report.duplicates, DuplicateOutcome::Clean);
        assert!(report.bounds.iter().all(|o| o.clamped == 0 && o.deleted == 0));
    }

    #[test]
    fn no_duplicates_remain_after_clean() {
        let mut ds = TabularDataset::new();
        ds.push_record(&record(1, "A", 10.0, 2000, 1.0, 1.0));
        ds.push_record(&record(2, "A", 10.0, 2000, 1.0, 1.0));
        ds.push_record(&record(3, "B", 20.0, 2001, 2.0, 2.0));

        let (cleaned, _) = clean(ds).unwrap();

        for a in 0..cleaned.len() {
            for b in (a + 1)..cleaned.len() {
                assert_ne!(cleaned.row(a), cleaned.row(b));
            }
        }
    }
}
