//! Ranker training and invocation.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::RetrieveAndRankClient;
use crate::error::ClientError;
use crate::observer::CallObserver;
use crate::transport::{HttpRequest, MultipartPart, Transport};

const RANKERS: &str = "rankers";

#[derive(Serialize)]
struct TrainingMetadata<'a> {
    name: &'a str,
}

impl<T: Transport, O: CallObserver> RetrieveAndRankClient<T, O> {
    pub async fn list_rankers(&self) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&[RANKERS])?);
        self.send_json("list_rankers", req).await
    }

    pub async fn get_ranker(&self, ranker_id: &str) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&[RANKERS, ranker_id])?);
        self.send_json("get_ranker", req).await
    }

    pub async fn delete_ranker(&self, ranker_id: &str) -> Result<(), ClientError> {
        let req = HttpRequest::delete(self.endpoint(&[RANKERS, ranker_id])?);
        self.send_unit("delete_ranker", req).await
    }

    /// Re-score candidate answers (a feature CSV) with a trained ranker.
    pub async fn rank(
        &self,
        ranker_id: &str,
        answer_data: impl AsRef<Path>,
    ) -> Result<Value, ClientError> {
        let path = answer_data.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "answer_data.csv".to_string());

        let parts =
            vec![MultipartPart::file("answer_data", filename, bytes).content_type("text/csv")];
        let req =
            HttpRequest::post(self.endpoint(&[RANKERS, ranker_id, "rank"])?).multipart(parts);
        self.send_json("rank", req).await
    }

    /// Generate training data from a ground-truth file and train a ranker on it.
    ///
    /// Nothing is rolled back: if the ranker request fails, the generated
    /// training data is dropped (apart from anything written to `destination`).
    pub async fn create_ranker(
        &self,
        name: &str,
        ground_truth: impl AsRef<Path>,
        cluster_id: &str,
        collection: &str,
        destination: Option<&Path>,
    ) -> Result<Value, ClientError> {
        let mut generator = self.training_data_generator(cluster_id, collection);
        if let Some(path) = destination {
            generator = generator.persist_to(path);
        }

        let training = generator.generate_from_path(ground_truth).await?;
        if !training.skipped.is_empty() {
            warn!(
                ranker = name,
                skipped = training.skipped.len(),
                "training data is missing rows"
            );
        }

        self.create_ranker_from_payload(name, training.payload).await
    }

    /// Train a ranker on an already generated payload.
    pub async fn create_ranker_from_payload(
        &self,
        name: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Value, ClientError> {
        let metadata = serde_json::to_string(&TrainingMetadata { name })
            .map_err(|e| ClientError::decode(e.to_string()))?;

        let parts = vec![
            MultipartPart::file("training_data", "training_data.csv", payload.into())
                .content_type("text/csv"),
            MultipartPart::text("training_metadata", metadata),
        ];
        let req = HttpRequest::post(self.endpoint(&[RANKERS])?).multipart(parts);
        self.send_json("create_ranker", req).await
    }
}
