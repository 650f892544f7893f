//! In-memory tabular data read from and written to CSV artifacts.

use crate::error::{TrainingError, TrainingResult};
use std::path::Path;

/// A small row-major table of string cells.
///
/// Cells stay as text until the encoder decides whether a column is numeric
/// or categorical, so reading and re-writing a CSV preserves it exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> TrainingResult<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TrainingError::SchemaMismatch(format!(
                    "row {idx} has {} cells, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn read_csv(path: &Path) -> TrainingResult<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let columns = reader.headers()?.iter().map(str::to_string).collect::<Vec<_>>();
        if columns.is_empty() {
            return Err(TrainingError::SchemaMismatch(format!("{} has no header row", path.display())));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Self::new(columns, rows)
    }

    pub fn write_csv(&self, path: &Path) -> TrainingResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_columns(&self, names: &[&str]) -> TrainingResult<()> {
        let missing: Vec<&str> =
            names.iter().copied().filter(|n| self.column_index(n).is_none()).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TrainingError::SchemaMismatch(format!("missing columns: {}", missing.join(", "))))
        }
    }

    /// Project onto `names`, in that order.
    pub fn select(&self, names: &[&str]) -> TrainingResult<Self> {
        self.require_columns(names)?;
        let idx: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        let rows = self.rows.iter().map(|row| idx.iter().map(|&i| row[i].clone()).collect()).collect();
        Ok(Self { columns: names.iter().map(|n| (*n).to_string()).collect(), rows })
    }

    /// Rows at `indices`, in that order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        let rows = indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect();
        Self { columns: self.columns.clone(), rows }
    }

    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self { columns: self.columns.clone(), rows: self.rows.iter().take(n).cloned().collect() }
    }

    pub fn column(&self, name: &str) -> TrainingResult<Vec<&str>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TrainingError::SchemaMismatch(format!("missing column: {name}")))?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }
}
