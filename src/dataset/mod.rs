//! Dataset injection
//!
//! A table is serialized once into the scratch directory and every
//! subsequent script loads it through the prelude.

pub mod injector;

pub use injector::{DatasetInjector, InjectedDataset};

use crate::config::types::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Anything the injector can serialize for the prelude to load.
///
/// The blob must be split-orientation JSON:
/// `{"columns": [...], "data": [[...], ...]}`.
pub trait Dataset {
    /// `(rows, columns)`
    fn shape(&self) -> (usize, usize);

    fn write_blob(&self, out: &mut dyn Write) -> Result<()>;
}

/// In-memory table with named columns and JSON cells.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SplitTable {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
}

impl Table {
    /// Every row must have exactly one cell per column.
    pub fn new(columns: Vec<String>, data: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((index, row)) = data
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(SandboxError::Dataset(format!(
                "row {} has {} cells, expected {}",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, data })
    }

    /// Load a split-orientation JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Dataset(format!("Failed to read dataset {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let split: SplitTable = serde_json::from_str(content)
            .map_err(|e| SandboxError::Dataset(format!("Failed to parse dataset JSON: {}", e)))?;
        Self::new(split.columns, split.data)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.data
    }
}

impl Dataset for Table {
    fn shape(&self) -> (usize, usize) {
        (self.data.len(), self.columns.len())
    }

    fn write_blob(&self, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer(out, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![json!(1), json!(2)], vec![json!(3)]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 cells"));
    }

    #[test]
    fn split_json_round_trips_through_blob() {
        let table = Table::from_json_str(r#"{"columns": ["region", "sales"], "data": [["N", 100], ["S", 200]]}"#)
            .unwrap();
        assert_eq!(table.shape(), (2, 2));

        let mut blob = Vec::new();
        table.write_blob(&mut blob).unwrap();
        let reloaded = Table::from_json_str(std::str::from_utf8(&blob).unwrap()).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn empty_table_has_zero_rows() {
        let table = Table::new(vec!["only".into()], Vec::new()).unwrap();
        assert_eq!(table.shape(), (0, 1));
    }
}
