//! HTTP transport boundary
//!
//! A transport performs exactly one verb + absolute URI + optional JSON
//! body exchange and reports status, `Location` header and body text.
//! Everything above it (strategies, batching, caching) is transport
//! agnostic, so tests substitute an in-memory server.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::RestResult;

/// HTTP verbs used by the REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Raw result of one HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub location: Option<String>,
    /// `None` when the server answered 204 No Content
    pub body: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16, location: Option<String>, body: Option<String>) -> Self {
        Self { status, location, body }
    }
}

/// A single request/response exchange against an absolute URI
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        uri: &str,
        body: Option<&serde_json::Value>,
    ) -> RestResult<TransportResponse>;
}

/// reqwest-backed transport with JSON bodies and optional basic auth
pub struct HttpTransport {
    client: Client,
    credentials: Option<(String, String)>,
}

impl HttpTransport {
    /// Build a transport with the configured timeouts and credentials
    pub fn new(config: &ClientConfig) -> RestResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self { client, credentials })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        uri: &str,
        body: Option<&serde_json::Value>,
    ) -> RestResult<TransportResponse> {
        debug!("{} {}", method, uri);

        let mut builder = self
            .client
            .request(method.into(), uri)
            .header(ACCEPT, "application/json");
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = if status == StatusCode::NO_CONTENT {
            None
        } else {
            Some(response.text().await?)
        };

        debug!("{} {} -> {}", method, uri, status.as_u16());
        Ok(TransportResponse::new(status.as_u16(), location, body))
    }
}
