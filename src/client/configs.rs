//! Configuration sets (zipped search configuration) attached to a cluster.

use std::path::Path;
use std::time::Instant;

use serde_json::Value;

use super::RetrieveAndRankClient;
use crate::error::ClientError;
use crate::observer::{CallObserver, CallRecord};
use crate::transport::{Download, HttpRequest, Transport};

impl<T: Transport, O: CallObserver> RetrieveAndRankClient<T, O> {
    fn config_url(&self, cluster_id: &str, config_name: &str) -> Result<String, ClientError> {
        self.endpoint(&["solr_clusters", cluster_id, "config", config_name])
    }

    pub async fn list_configs(&self, cluster_id: &str) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&["solr_clusters", cluster_id, "config"])?);
        self.send_json("list_configs", req).await
    }

    /// Upload a zipped configuration set under `config_name`.
    pub async fn upload_config(
        &self,
        cluster_id: &str,
        config_name: &str,
        zip_path: impl AsRef<Path>,
    ) -> Result<(), ClientError> {
        let bytes = tokio::fs::read(zip_path.as_ref()).await?;
        let req = HttpRequest::post(self.config_url(cluster_id, config_name)?)
            .binary("application/zip", bytes);
        self.send_unit("upload_config", req).await
    }

    /// Stream a configuration set to `dest`. Returns the number of bytes written.
    pub async fn download_config(
        &self,
        cluster_id: &str,
        config_name: &str,
        dest: impl AsRef<Path>,
    ) -> Result<u64, ClientError> {
        let req = HttpRequest::get(self.config_url(cluster_id, config_name)?)
            .header("accept", "application/zip");
        let record = CallRecord::new("download_config", req.method, req.url.clone());
        let start = Instant::now();

        let result = self.transport().download(req, dest.as_ref()).await;
        let record = record.latency(start.elapsed().as_millis() as u64);

        match result {
            Ok(Download::Saved { bytes_written }) => {
                self.observer().record(record.http_status(200)).await;
                Ok(bytes_written)
            }
            Ok(Download::Rejected(response)) => {
                let err = ClientError::http_status(response.status, response.text());
                self.observer()
                    .record(
                        record
                            .http_status(response.status)
                            .failure(err.code(), err.to_string()),
                    )
                    .await;
                Err(err)
            }
            Err(transport_err) => {
                let err = ClientError::Transport(transport_err);
                self.observer()
                    .record(record.failure(err.code(), err.to_string()))
                    .await;
                Err(err)
            }
        }
    }

    pub async fn delete_config(
        &self,
        cluster_id: &str,
        config_name: &str,
    ) -> Result<(), ClientError> {
        let req = HttpRequest::delete(self.config_url(cluster_id, config_name)?);
        self.send_unit("delete_config", req).await
    }
}
