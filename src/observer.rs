//! Call observation via the CallObserver trait.
//!
//! The client reports every request it sends through a CallObserver instead
//! of writing to a log file of its own:
//! - applications use TracingCallObserver (default) or their own sink
//! - tests use MemoryCallObserver to assert on what was sent
//! - NoopCallObserver discards everything

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::transport::HttpMethod;

/// Outcome of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Failure,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Failure => "failure",
        }
    }
}

/// Record of one service call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Client operation: "list_clusters", "create_ranker", etc.
    pub operation: &'static str,
    pub method: HttpMethod,
    pub url: String,
    /// HTTP status code, absent when the transport failed.
    pub http_status: Option<u16>,
    pub latency_ms: u64,
    pub status: CallStatus,
    /// Error code if status is Failure.
    pub error_code: Option<&'static str>,
    /// Error message if status is Failure.
    pub message: Option<String>,
    /// Service transaction id from the response headers.
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(operation: &'static str, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            url: url.into(),
            http_status: None,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            message: None,
            request_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn failure(mut self, code: &'static str, message: impl Into<String>) -> Self {
        self.status = CallStatus::Failure;
        self.error_code = Some(code);
        self.message = Some(message.into());
        self
    }
}

/// Trait for observing service calls.
#[async_trait]
pub trait CallObserver: Send + Sync {
    /// Record a call. Fire-and-forget: observer failures never reach the caller.
    async fn record(&self, record: CallRecord);
}

/// Discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallObserver;

#[async_trait]
impl CallObserver for NoopCallObserver {
    async fn record(&self, _record: CallRecord) {}
}

/// Emits one `tracing` event per call: debug on success, warn on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCallObserver;

#[async_trait]
impl CallObserver for TracingCallObserver {
    async fn record(&self, record: CallRecord) {
        match record.status {
            CallStatus::Success => tracing::debug!(
                operation = record.operation,
                method = record.method.as_str(),
                url = %record.url,
                status = record.status.as_str(),
                http_status = record.http_status,
                latency_ms = record.latency_ms,
                request_id = record.request_id.as_deref(),
                "call succeeded"
            ),
            CallStatus::Failure => tracing::warn!(
                operation = record.operation,
                method = record.method.as_str(),
                url = %record.url,
                status = record.status.as_str(),
                http_status = record.http_status,
                latency_ms = record.latency_ms,
                request_id = record.request_id.as_deref(),
                error_code = record.error_code,
                "call failed: {}",
                record.message.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryCallObserver {
    records: Mutex<Vec<CallRecord>>,
}

impl MemoryCallObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<CallRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.status == CallStatus::Failure)
            .collect()
    }
}

#[async_trait]
impl CallObserver for MemoryCallObserver {
    async fn record(&self, record: CallRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
