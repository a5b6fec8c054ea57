//! Ranker training data generation.
//!
//! For every ground-truth row the generator asks the search service to score
//! the labelled candidates and return them in ranker-input format (`RSInput`).
//! The returned fragments are concatenated, in row order and without a
//! separator, into one training payload. The first query asks for a header
//! row; every later query does not, so the concatenation carries exactly one.
//!
//! Failure policy:
//! - transport errors, non-200 statuses and unparsable bodies skip the row;
//!   the failure is kept in [`TrainingData::skipped`] and the next row is tried
//! - a 200 response without `RSInput` aborts the pass with
//!   [`ClientError::MissingField`]; fragments already appended to the
//!   destination file stay there
//!
//! Rows are processed strictly one after another.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::client::{decode_json, RetrieveAndRankClient};
use crate::error::ClientError;
use crate::ground_truth::{read_ground_truth, GroundTruthRow};
use crate::observer::CallObserver;
use crate::transport::{HttpRequest, Transport};

/// Candidates scored per question.
pub const RESULT_COUNT: u32 = 10;

/// Joins a row's relevance labels into the `gt` parameter.
pub const RELEVANCE_SEPARATOR: &str = ",";

/// Response field holding the ranker-input fragment.
pub const RANKER_INPUT_FIELD: &str = "RSInput";

// =============================================================================
// QUERY
// =============================================================================

/// Parameters of one training query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub question: String,
    pub relevance_labels: String,
    pub generate_header: bool,
}

impl QueryParameters {
    /// `index` is the row's position in iteration order; only row 0 asks for
    /// the header.
    pub fn for_row(row: &GroundTruthRow, index: usize) -> Self {
        Self {
            question: row.question().to_string(),
            relevance_labels: row.relevance_labels().join(RELEVANCE_SEPARATOR),
            generate_header: index == 0,
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("q".to_string(), self.question.clone()),
            ("gt".to_string(), self.relevance_labels.clone()),
            ("generateHeader".to_string(), self.generate_header.to_string()),
            ("rows".to_string(), RESULT_COUNT.to_string()),
            ("returnRSInput".to_string(), "true".to_string()),
            ("wt".to_string(), "json".to_string()),
        ]
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// A row that contributed nothing to the payload.
#[derive(Debug)]
pub struct RowFailure {
    pub row_index: usize,
    pub question: String,
    pub error: ClientError,
}

/// Outcome of a generation pass.
#[derive(Debug, Default)]
pub struct TrainingData {
    /// Row-ordered concatenation of every collected fragment.
    pub payload: String,
    pub queries_issued: usize,
    pub fragments_collected: usize,
    pub skipped: Vec<RowFailure>,
}

impl TrainingData {
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Pull the ranker-input fragment out of a training query response.
pub fn extract_fragment(body: &Value) -> Result<String, ClientError> {
    body.get(RANKER_INPUT_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::missing_field(RANKER_INPUT_FIELD, "training query response"))
}

// =============================================================================
// GENERATOR
// =============================================================================

pub struct TrainingDataGenerator<'c, T: Transport, O: CallObserver> {
    client: &'c RetrieveAndRankClient<T, O>,
    cluster_id: String,
    collection: String,
    destination: Option<PathBuf>,
}

impl<'c, T: Transport, O: CallObserver> TrainingDataGenerator<'c, T, O> {
    pub fn new(
        client: &'c RetrieveAndRankClient<T, O>,
        cluster_id: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            client,
            cluster_id: cluster_id.into(),
            collection: collection.into(),
            destination: None,
        }
    }

    /// Also append each fragment to `path` as soon as it arrives.
    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    pub async fn generate_from_path(
        &self,
        ground_truth: impl AsRef<Path>,
    ) -> Result<TrainingData, ClientError> {
        let rows = read_ground_truth(ground_truth)?;
        self.generate(&rows).await
    }

    pub async fn generate(&self, rows: &[GroundTruthRow]) -> Result<TrainingData, ClientError> {
        let url = self.client.endpoint(&[
            "solr_clusters",
            self.cluster_id.as_str(),
            "solr",
            self.collection.as_str(),
            "fcselect",
        ])?;
        let mut sink = match &self.destination {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?,
            ),
            None => None,
        };

        let mut fragments: Vec<String> = Vec::with_capacity(rows.len());
        let mut data = TrainingData::default();

        for (index, row) in rows.iter().enumerate() {
            let params = QueryParameters::for_row(row, index);
            data.queries_issued += 1;

            match self.fetch_fragment(&url, &params).await {
                Ok(fragment) => {
                    if let Some(file) = sink.as_mut() {
                        append(file, &fragment).await?;
                    }
                    fragments.push(fragment);
                }
                Err(err @ ClientError::MissingField { .. }) => {
                    warn!(
                        row = index,
                        cluster_id = %self.cluster_id,
                        collection = %self.collection,
                        "aborting training data generation: {err}"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        row = index,
                        code = err.code(),
                        "skipping ground truth row: {err}"
                    );
                    data.skipped.push(RowFailure {
                        row_index: index,
                        question: params.question,
                        error: err,
                    });
                }
            }
        }

        data.fragments_collected = fragments.len();
        data.payload = fragments.concat();

        info!(
            rows = rows.len(),
            fragments = data.fragments_collected,
            skipped = data.skipped.len(),
            bytes = data.payload.len(),
            "training data generated"
        );
        Ok(data)
    }

    async fn fetch_fragment(
        &self,
        url: &str,
        params: &QueryParameters,
    ) -> Result<String, ClientError> {
        let req = HttpRequest::get(url)
            .accept_json()
            .query_pairs(params.to_query_pairs());
        self.client
            .send_checked("training_query", req, |response| {
                extract_fragment(&decode_json(response)?)
            })
            .await
    }
}

async fn append(file: &mut File, fragment: &str) -> Result<(), ClientError> {
    file.write_all(fragment.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

impl<T: Transport, O: CallObserver> RetrieveAndRankClient<T, O> {
    pub fn training_data_generator(
        &self,
        cluster_id: impl Into<String>,
        collection: impl Into<String>,
    ) -> TrainingDataGenerator<'_, T, O> {
        TrainingDataGenerator::new(self, cluster_id, collection)
    }
}
