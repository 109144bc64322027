//! HTTP transport used to reach the registry helper
//!
//! The reconciler only ever talks to the helper through [`HttpTransport`], so
//! tests can swap in a scripted transport and production code uses
//! [`ReqwestTransport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::error::RegistryError;

/// Outbound request, relative to the transport's base URL
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path starting with `/`, passed through without re-encoding
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Raw response; any status is returned as-is, classification is up to the caller
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Body as lossy UTF-8, for error messages
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RegistryError> {
        serde_json::from_slice(&self.body).map_err(|source| RegistryError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// Capability to perform one HTTP round trip against the registry helper
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the response, whatever its status.
    ///
    /// Only failures to obtain a response at all are errors here.
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, RegistryError>;
}

/// [`HttpTransport`] backed by a `reqwest` client
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Transport {
                method: "-".to_string(),
                path: base_url.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing client (shares its connection pool)
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, RegistryError> {
        let url = format!("{}{}", self.base_url, request.path);
        let transport_err = |message: String| RegistryError::Transport {
            method: request.method.to_string(),
            path: request.path.clone(),
            message,
        };

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                transport_err(format!("request timed out: {}", e))
            } else {
                transport_err(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_err(format!("failed to read response body: {}", e)))?;

        tracing::trace!(
            method = %request.method,
            path = %request.path,
            status,
            "Registry helper responded"
        );

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
