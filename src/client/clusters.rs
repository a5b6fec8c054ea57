//! Search cluster lifecycle.

use serde_json::{json, Value};

use super::RetrieveAndRankClient;
use crate::error::ClientError;
use crate::observer::CallObserver;
use crate::transport::{HttpRequest, Transport};

const CLUSTERS: &str = "solr_clusters";

/// Number of units in a search cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSize(u32);

impl ClusterSize {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 7;

    pub fn new(size: u32) -> Result<Self, ClientError> {
        if !(Self::MIN..=Self::MAX).contains(&size) {
            return Err(ClientError::validation(format!(
                "cluster size must be between {} and {}, got {size}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(size))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl<T: Transport, O: CallObserver> RetrieveAndRankClient<T, O> {
    pub async fn list_clusters(&self) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&[CLUSTERS])?);
        self.send_json("list_clusters", req).await
    }

    /// Create a cluster. Omitting the size requests the service's free tier.
    pub async fn create_cluster(
        &self,
        name: &str,
        size: Option<ClusterSize>,
    ) -> Result<Value, ClientError> {
        let mut body = json!({ "cluster_name": name });
        if let Some(size) = size {
            body["cluster_size"] = json!(size.get().to_string());
        }
        let req = HttpRequest::post(self.endpoint(&[CLUSTERS])?).json(body);
        self.send_json("create_cluster", req).await
    }

    pub async fn get_cluster(&self, cluster_id: &str) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&[CLUSTERS, cluster_id])?);
        self.send_json("get_cluster", req).await
    }

    pub async fn delete_cluster(&self, cluster_id: &str) -> Result<(), ClientError> {
        let req = HttpRequest::delete(self.endpoint(&[CLUSTERS, cluster_id])?);
        self.send_unit("delete_cluster", req).await
    }

    /// Resize a cluster. Sizes outside 1..=7 are rejected without a request.
    pub async fn resize_cluster(&self, cluster_id: &str, size: u32) -> Result<Value, ClientError> {
        let url = self.endpoint(&[CLUSTERS, cluster_id, "cluster_size"])?;
        let size = match ClusterSize::new(size) {
            Ok(size) => size,
            Err(err) => {
                let req = HttpRequest::put(url);
                return Err(self.reject("resize_cluster", &req, err).await);
            }
        };
        let req = HttpRequest::put(url).json(json!({ "cluster_size": size.get() }));
        self.send_json("resize_cluster", req).await
    }

    pub async fn cluster_resize_status(&self, cluster_id: &str) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&[CLUSTERS, cluster_id, "cluster_size"])?);
        self.send_json("cluster_resize_status", req).await
    }

    pub async fn cluster_stats(&self, cluster_id: &str) -> Result<Value, ClientError> {
        let req = HttpRequest::get(self.endpoint(&[CLUSTERS, cluster_id, "stats"])?);
        self.send_json("cluster_stats", req).await
    }
}
