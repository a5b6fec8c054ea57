//! Collections, document indexing and search.

use std::path::PathBuf;

use serde_json::Value;

use super::{decode_json, RetrieveAndRankClient};
use crate::error::ClientError;
use crate::observer::CallObserver;
use crate::transport::{HttpRequest, Transport};

/// Documents to index.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// JSON update file, sent byte for byte.
    File(PathBuf),
    /// In-memory update payload.
    Raw(Value),
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl<T: Transport, O: CallObserver> RetrieveAndRankClient<T, O> {
    fn collections_admin_url(&self, cluster_id: &str) -> Result<String, ClientError> {
        self.endpoint(&["solr_clusters", cluster_id, "solr", "admin", "collections"])
    }

    fn collection_url(
        &self,
        cluster_id: &str,
        collection: &str,
        handler: &str,
    ) -> Result<String, ClientError> {
        self.endpoint(&["solr_clusters", cluster_id, "solr", collection, handler])
    }

    pub async fn create_collection(
        &self,
        cluster_id: &str,
        config_name: &str,
        collection: &str,
    ) -> Result<Value, ClientError> {
        let form = pairs(&[
            ("action", "CREATE"),
            ("name", collection),
            ("collection.configName", config_name),
            ("wt", "json"),
        ]);
        let req = HttpRequest::post(self.collections_admin_url(cluster_id)?).form(form);
        self.send_json("create_collection", req).await
    }

    pub async fn delete_collection(
        &self,
        cluster_id: &str,
        collection: &str,
    ) -> Result<Value, ClientError> {
        let form = pairs(&[("action", "DELETE"), ("name", collection), ("wt", "json")]);
        let req = HttpRequest::post(self.collections_admin_url(cluster_id)?).form(form);
        self.send_json("delete_collection", req).await
    }

    pub async fn list_collections(&self, cluster_id: &str) -> Result<Value, ClientError> {
        let form = pairs(&[("action", "LIST"), ("wt", "json")]);
        let req = HttpRequest::post(self.collections_admin_url(cluster_id)?).form(form);
        self.send_json("list_collections", req).await
    }

    /// Index documents. A 200 answer whose `responseHeader.status` is not 0
    /// is reported as [`ClientError::Indexing`].
    pub async fn index_documents(
        &self,
        cluster_id: &str,
        collection: &str,
        source: DocumentSource,
    ) -> Result<Value, ClientError> {
        let bytes = match source {
            DocumentSource::File(path) => tokio::fs::read(&path).await?,
            DocumentSource::Raw(value) => {
                serde_json::to_vec(&value).map_err(|e| ClientError::decode(e.to_string()))?
            }
        };

        let req = HttpRequest::post(self.collection_url(cluster_id, collection, "update")?)
            .binary("application/json", bytes)
            .accept_json();
        self.send_checked("index_documents", req, |response| {
            let body = decode_json(response)?;
            let status = body
                .pointer("/responseHeader/status")
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    ClientError::missing_field("responseHeader.status", "index response")
                })?;
            if status != 0 {
                tracing::warn!(cluster_id, collection, status, "index update rejected");
                return Err(ClientError::Indexing {
                    status,
                    body: body.to_string(),
                });
            }
            Ok(body)
        })
        .await
    }

    /// Plain search; `fields` restricts the returned document fields.
    pub async fn search(
        &self,
        cluster_id: &str,
        collection: &str,
        question: &str,
        fields: &[&str],
    ) -> Result<Value, ClientError> {
        let fl = fields.join(",");
        let form = pairs(&[("q", question), ("wt", "json"), ("fl", fl.as_str())]);
        let req =
            HttpRequest::post(self.collection_url(cluster_id, collection, "select")?).form(form);
        self.send_json("search", req).await
    }

    /// Search re-scored by a trained ranker.
    pub async fn ranked_search(
        &self,
        cluster_id: &str,
        collection: &str,
        ranker_id: &str,
        question: &str,
        fields: &[&str],
    ) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.collection_url(cluster_id, collection, "fcselect")?)
            .query("ranker_id", ranker_id)
            .query("q", question)
            .query("wt", "json")
            .query("fl", fields.join(","));
        self.send_json("ranked_search", req).await
    }
}
