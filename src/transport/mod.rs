//! HTTP transport boundary.
//!
//! The client never talks to `reqwest` directly; it hands an [`HttpRequest`]
//! to a [`Transport`] and gets back status, headers and body.

pub mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use tokio::io::AsyncWriteExt;

use crate::error::TransportError;

pub use http::ReqwestTransport;

// =============================================================================
// REQUEST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One named part of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MultipartPart {
    /// Plain form field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            bytes: value.into().into_bytes(),
        }
    }

    /// File upload field.
    pub fn file(name: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: None,
            bytes,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Multipart(Vec<MultipartPart>),
    Binary {
        content_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Ask for a JSON response.
    pub fn accept_json(self) -> Self {
        self.header("accept", "application/json")
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(pairs);
        self
    }

    pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn binary(mut self, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.body = RequestBody::Binary {
            content_type: content_type.into(),
            bytes,
        };
        self
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// The service signals success with exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Service transaction id, if the gateway sent one.
    pub fn request_id(&self) -> Option<String> {
        REQUEST_ID_HEADERS
            .iter()
            .find_map(|name| self.headers.get(*name))
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

const REQUEST_ID_HEADERS: [&str; 2] = ["x-global-transaction-id", "x-request-id"];

/// Sibling of `dest` that a download is written to before it is renamed into place.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Move a finished partial file onto `dest`; remove it if `written` failed.
pub(crate) async fn finish_partial(
    partial: &Path,
    dest: &Path,
    written: Result<u64, TransportError>,
) -> Result<Download, TransportError> {
    match written {
        Ok(bytes_written) => {
            if let Err(err) = tokio::fs::rename(partial, dest).await {
                let _ = tokio::fs::remove_file(partial).await;
                return Err(err.into());
            }
            Ok(Download::Saved { bytes_written })
        }
        Err(err) => {
            let _ = tokio::fs::remove_file(partial).await;
            Err(err)
        }
    }
}

/// Result of streaming a response body to disk.
#[derive(Debug)]
pub enum Download {
    /// Status 200; the body was written to the destination. A failed transfer
    /// leaves the destination untouched.
    Saved { bytes_written: u64 },
    /// Any other status; the body was kept in memory and nothing was written.
    Rejected(HttpResponse),
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send `req` and write a 200 body to `dest`.
    ///
    /// The default buffers the whole body; transports that can stream should
    /// override it.
    async fn download(&self, req: HttpRequest, dest: &Path) -> Result<Download, TransportError> {
        let response = self.request(req).await?;
        if !response.is_ok() {
            return Ok(Download::Rejected(response));
        }
        let partial = partial_path(dest);
        let written = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            file.write_all(&response.body).await?;
            file.flush().await?;
            Ok::<_, TransportError>(response.body.len() as u64)
        }
        .await;
        finish_partial(&partial, dest, written).await
    }
}
