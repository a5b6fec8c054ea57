//! `reqwest`-backed transport with HTTP basic authentication.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use tokio::io::AsyncWriteExt;

use super::{
    finish_partial, partial_path, Download, HttpMethod, HttpRequest, HttpResponse, RequestBody,
    Transport,
};
use crate::config::ServiceConfig;
use crate::error::{ClientError, TransportError};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    username: String,
    password: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &ServiceConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| ClientError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
        })
    }

    fn build(&self, req: HttpRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = match req.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &req.url)
            .basic_auth(&self.username, Some(&self.password));

        for (name, value) in &req.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::Request(format!("invalid header value for {name}")))?;
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::Request(format!("invalid header name {name}")))?;
            builder = builder.header(name, value);
        }

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }

        let builder = match req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Binary {
                content_type,
                bytes,
            } => builder.header(CONTENT_TYPE, content_type).body(bytes),
            RequestBody::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    let mut field = Part::bytes(part.bytes);
                    if let Some(filename) = part.filename {
                        field = field.file_name(filename);
                    }
                    if let Some(content_type) = part.content_type {
                        field = field
                            .mime_str(&content_type)
                            .map_err(|e| TransportError::Request(e.to_string()))?;
                    }
                    form = form.part(part.name, field);
                }
                builder.multipart(form)
            }
        };

        Ok(builder)
    }

    async fn stream_to(
        &self,
        response: &mut reqwest::Response,
        path: &Path,
    ) -> Result<u64, TransportError> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut bytes_written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(bytes_written)
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .build(req)?
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download(&self, req: HttpRequest, dest: &Path) -> Result<Download, TransportError> {
        let mut response = self
            .build(req)?
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(|e| self.classify(e))?;
            return Ok(Download::Rejected(HttpResponse {
                status,
                headers,
                body,
            }));
        }

        // Stream chunks to a sibling file, renamed onto dest once complete
        let partial = partial_path(dest);
        let written = self.stream_to(&mut response, &partial).await;
        finish_partial(&partial, dest, written).await
    }
}
