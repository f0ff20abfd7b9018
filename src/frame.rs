use crate::error::{EtlError, Result};
use crate::types::NormalizedRecord;
use std::path::Path;
use tracing::info;

/// Declared type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

/// A single cell. `Null` is an explicit missing value, never a sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnSpec {
    fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// The fixed analysis schema: `id` is the row index, not a data column.
/// `year` is a nullable integer; the other numeric columns are floats.
fn landing_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("name", ColumnType::Text),
        ColumnSpec::new("mass", ColumnType::Float),
        ColumnSpec::new("year", ColumnType::Integer),
        ColumnSpec::new("reclat", ColumnType::Float),
        ColumnSpec::new("reclong", ColumnType::Float),
    ]
}

/// An ordered collection of rows indexed by `id` with declared per-column
/// types. Created by a relational read (or a CSV import), mutated in place
/// by the cleaning passes, then handed off immutably.
///
/// Equality is value-for-value over ids, columns, and cells, which is what
/// the CSV round-trip check relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    columns: Vec<ColumnSpec>,
    ids: Vec<i64>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularDataset {
    pub fn new() -> Self {
        Self {
            columns: landing_columns(),
            ids: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        &self.rows[row]
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        &self.rows[row][col]
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: CellValue) {
        self.rows[row][col] = value;
    }

    pub fn push_record(&mut self, record: &NormalizedRecord) {
        self.ids.push(record.id);
        self.rows.push(vec![
            CellValue::Text(record.name.clone()),
            CellValue::Float(record.mass),
            CellValue::Int(record.year),
            CellValue::Float(record.reclat),
            CellValue::Float(record.reclong),
        ]);
    }

    /// Appends a row with explicit cells, for assembly paths that preserve
    /// missing values instead of substituting defaults.
    pub fn push_row(&mut self, id: i64, cells: Vec<CellValue>) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(EtlError::InvalidRecord(format!(
                "row for id {id} has {} cells, expected {}",
                cells.len(),
                self.columns.len()
            )));
        }
        self.ids.push(id);
        self.rows.push(cells);
        Ok(())
    }

    /// Count of missing values per column, in column order.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(col, spec)| {
                let count = self.rows.iter().filter(|row| row[col].is_null()).count();
                (spec.name.clone(), count)
            })
            .collect()
    }

    /// Non-missing numeric values of a column.
    pub fn column_f64(&self, col: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row[col].as_f64())
            .collect()
    }

    /// Mean over the non-missing values of a numeric column. `None` for
    /// non-numeric columns and columns with no values to average.
    pub fn column_mean(&self, col: usize) -> Option<f64> {
        if !self.columns[col].ty.is_numeric() {
            return None;
        }
        let values = self.column_f64(col);
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Keeps only the rows whose index satisfies the predicate, preserving
    /// order and keeping ids in lockstep.
    pub fn retain_rows<F: FnMut(usize) -> bool>(&mut self, mut keep: F) {
        let flags: Vec<bool> = (0..self.rows.len()).map(|i| keep(i)).collect();
        let mut it = flags.iter();
        self.ids.retain(|_| *it.next().unwrap());
        let mut it = flags.iter();
        self.rows.retain(|_| *it.next().unwrap());
    }

    /// Writes the dataset as CSV with `id` as the leading row-key column.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["id".to_string()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        writer.write_record(&header)?;

        for (id, row) in self.ids.iter().zip(&self.rows) {
            let mut fields = vec![id.to_string()];
            fields.extend(row.iter().map(cell_to_field));
            writer.write_record(&fields)?;
        }
        writer.flush()?;

        info!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads a CSV produced by [`write_csv`] back under the declared column
    /// types. Empty fields in numeric columns become `Null`; empty fields
    /// in text columns are empty strings.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<TabularDataset> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;

        let mut dataset = TabularDataset::new();
        let expected: Vec<String> = std::iter::once("id".to_string())
            .chain(dataset.columns.iter().map(|c| c.name.clone()))
            .collect();
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers != expected {
            return Err(EtlError::Verification(format!(
                "unexpected CSV header {headers:?} in {}",
                path.display()
            )));
        }

        for record in reader.records() {
            let record = record?;
            let id = parse_field::<i64>(record.get(0).unwrap_or_default(), "id")?;
            let mut cells = Vec::with_capacity(dataset.columns.len());
            for (col, spec) in dataset.columns.iter().enumerate() {
                let field = record.get(col + 1).unwrap_or_default();
                cells.push(field_to_cell(field, spec)?);
            }
            dataset.ids.push(id);
            dataset.rows.push(cells);
        }
        Ok(dataset)
    }
}

impl Default for TabularDataset {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_to_field(cell: &CellValue) -> String {
    match cell {
        CellValue::Int(v) => v.to_string(),
        // f64 Display is the shortest round-trip representation.
        CellValue::Float(v) => v.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Null => String::new(),
    }
}

fn field_to_cell(field: &str, spec: &ColumnSpec) -> Result<CellValue> {
    match spec.ty {
        ColumnType::Text => Ok(CellValue::Text(field.to_string())),
        ColumnType::Integer => {
            if field.is_empty() {
                Ok(CellValue::Null)
            } else {
                Ok(CellValue::Int(parse_field::<i64>(field, &spec.name)?))
            }
        }
        ColumnType::Float => {
            if field.is_empty() {
                Ok(CellValue::Null)
            } else {
                Ok(CellValue::Float(parse_field::<f64>(field, &spec.name)?))
            }
        }
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, column: &str) -> Result<T> {
    field.parse::<T>().map_err(|_| {
        EtlError::InvalidRecord(format!("column '{column}': cannot parse {field:?}"))
    })
}
