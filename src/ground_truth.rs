//! Ground-truth table reader.
//!
//! Each row is a question followed by relevance labels for candidate
//! documents, e.g. `how do I reset my password,doc_12,4,doc_7,1`. No header
//! row is expected; rows may have different lengths.

use std::io;
use std::path::Path;

use crate::error::ClientError;

/// One row of the ground-truth table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruthRow {
    fields: Vec<String>,
}

impl GroundTruthRow {
    pub fn new(fields: Vec<String>) -> Result<Self, ClientError> {
        if fields.is_empty() {
            return Err(ClientError::ground_truth("row has no question field"));
        }
        Ok(Self { fields })
    }

    pub fn question(&self) -> &str {
        &self.fields[0]
    }

    pub fn relevance_labels(&self) -> &[String] {
        &self.fields[1..]
    }
}

/// Read every row of a comma-delimited ground-truth file, in file order.
pub fn read_ground_truth(path: impl AsRef<Path>) -> Result<Vec<GroundTruthRow>, ClientError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        ClientError::ground_truth(format!("failed to open {}: {e}", path.display()))
    })?;
    parse_ground_truth(file)
}

pub fn parse_ground_truth<R: io::Read>(reader: R) -> Result<Vec<GroundTruthRow>, ClientError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record =
            record.map_err(|e| ClientError::ground_truth(format!("row {}: {e}", line + 1)))?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        rows.push(GroundTruthRow::new(fields)?);
    }
    Ok(rows)
}
