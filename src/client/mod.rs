//! Client for the retrieve-and-rank service.
//!
//! Endpoint wrappers are grouped by resource:
//! - [`clusters`]: search cluster lifecycle and sizing
//! - [`configs`]: configuration set upload/download
//! - [`collections`]: collections, indexing and search
//! - [`rankers`]: ranker training and invocation
//!
//! Every wrapper sends exactly one request. Success is HTTP 200; anything else
//! comes back as [`ClientError::HttpStatus`]. Each call is reported to the
//! observer once, after the response body has been checked.

pub mod clusters;
pub mod collections;
pub mod configs;
pub mod rankers;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::config::ServiceConfig;
use crate::error::ClientError;
use crate::observer::{CallObserver, CallRecord, TracingCallObserver};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub use clusters::ClusterSize;
pub use collections::DocumentSource;

pub struct RetrieveAndRankClient<
    T: Transport = ReqwestTransport,
    O: CallObserver = TracingCallObserver,
> {
    config: ServiceConfig,
    transport: Arc<T>,
    observer: Arc<O>,
}

impl RetrieveAndRankClient {
    /// Create with the `reqwest` transport and `tracing` observer.
    pub fn new(config: ServiceConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(TracingCallObserver),
        ))
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ServiceConfig::from_env()?)
    }
}

impl<T: Transport, O: CallObserver> RetrieveAndRankClient<T, O> {
    pub fn with_parts(config: ServiceConfig, transport: Arc<T>, observer: Arc<O>) -> Self {
        Self {
            config,
            transport,
            observer,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn observer(&self) -> &Arc<O> {
        &self.observer
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<String, ClientError> {
        self.config.endpoint(segments)
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one request, map any non-200 status to an error and run `check` on
    /// a 200 response before the call is recorded. An error from `check` is
    /// recorded as a failure.
    pub(crate) async fn send_checked<R, F>(
        &self,
        operation: &'static str,
        req: HttpRequest,
        check: F,
    ) -> Result<R, ClientError>
    where
        F: FnOnce(&HttpResponse) -> Result<R, ClientError> + Send,
    {
        let record = CallRecord::new(operation, req.method, req.url.clone());
        let start = Instant::now();

        let result = self.transport.request(req).await;
        let record = record.latency(start.elapsed().as_millis() as u64);

        let response = match result {
            Ok(response) => response,
            Err(transport_err) => {
                let err = ClientError::Transport(transport_err);
                self.observer
                    .record(record.failure(err.code(), err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let mut record = record.http_status(response.status);
        if let Some(id) = response.request_id() {
            record = record.request_id(id);
        }

        let outcome = if response.is_ok() {
            check(&response)
        } else {
            Err(ClientError::http_status(response.status, response.text()))
        };

        match &outcome {
            Ok(_) => self.observer.record(record).await,
            Err(err) => {
                self.observer
                    .record(record.failure(err.code(), err.to_string()))
                    .await
            }
        }
        outcome
    }

    pub(crate) async fn send_json(
        &self,
        operation: &'static str,
        req: HttpRequest,
    ) -> Result<Value, ClientError> {
        self.send_checked(operation, req.accept_json(), decode_json).await
    }

    pub(crate) async fn send_unit(
        &self,
        operation: &'static str,
        req: HttpRequest,
    ) -> Result<(), ClientError> {
        self.send_checked(operation, req, |_| Ok(())).await
    }

    /// Report a request rejected before it reached the transport.
    pub(crate) async fn reject(
        &self,
        operation: &'static str,
        req: &HttpRequest,
        err: ClientError,
    ) -> ClientError {
        self.observer
            .record(
                CallRecord::new(operation, req.method, req.url.clone())
                    .failure(err.code(), err.to_string()),
            )
            .await;
        err
    }
}

pub(crate) fn decode_json(response: &HttpResponse) -> Result<Value, ClientError> {
    serde_json::from_slice(&response.body).map_err(|e| ClientError::decode(e.to_string()))
}
