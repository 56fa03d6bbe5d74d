//! Request strategies
//!
//! The facade never talks to the transport directly. It holds a
//! [`RestRequest`] strategy: [`ExecutingRequest`] performs the call now,
//! [`RecordingRequest`] appends it to a batch ledger and hands back a
//! deferred [`Outcome`]. Both can be rebased onto an entity URI with
//! [`RestRequest::with`] so entity paths stay relative
//! (`properties/name`, `relationships`, ...).

use async_trait::async_trait;
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::batch::ledger::OperationLedger;
use crate::error::{RestError, RestResult};
use crate::outcome::Outcome;
use crate::transport::{Method, Transport};

/// Strategy through which the facade issues requests
#[async_trait]
pub trait RestRequest: Send + Sync + fmt::Debug {
    /// Base URI that relative paths are resolved against
    fn uri(&self) -> &str;

    /// Same strategy rooted at another URI
    fn with(&self, uri: &str) -> Arc<dyn RestRequest>;

    /// Whether calls are deferred into a batch
    fn is_recording(&self) -> bool {
        false
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> RestResult<Outcome>;

    async fn get(&self, path: &str) -> RestResult<Outcome> {
        self.execute(Method::Get, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> RestResult<Outcome> {
        self.execute(Method::Post, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: Value) -> RestResult<Outcome> {
        self.execute(Method::Put, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> RestResult<Outcome> {
        self.execute(Method::Delete, path, None).await
    }
}

/// Absolute URIs and batch job references (`{3}`) are never rebased
pub(crate) fn is_absolute(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://") || uri.starts_with('{')
}

/// Resolve `path` against `base`; absolute paths win, empty paths
/// address the base itself
pub(crate) fn join_uri(base: &str, path: &str) -> String {
    if is_absolute(path) {
        return path.to_string();
    }
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Everything but alphanumerics and `. - * _` is escaped; space is `%20`
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

/// Percent-encode one path segment (index key or value, property key)
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Strategy that sends every call to the transport immediately
#[derive(Clone)]
pub struct ExecutingRequest {
    base_uri: String,
    transport: Arc<dyn Transport>,
}

impl ExecutingRequest {
    pub fn new(base_uri: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let mut base_uri = base_uri.into();
        while base_uri.ends_with('/') {
            base_uri.pop();
        }
        Self { base_uri, transport }
    }

    /// Rebase without erasing the concrete type
    pub fn rebased(&self, uri: &str) -> ExecutingRequest {
        ExecutingRequest::new(join_uri(&self.base_uri, uri), self.transport.clone())
    }
}

impl fmt::Debug for ExecutingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutingRequest")
            .field("base_uri", &self.base_uri)
            .finish()
    }
}

#[async_trait]
impl RestRequest for ExecutingRequest {
    fn uri(&self) -> &str {
        &self.base_uri
    }

    fn with(&self, uri: &str) -> Arc<dyn RestRequest> {
        Arc::new(self.rebased(uri))
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> RestResult<Outcome> {
        let uri = join_uri(&self.base_uri, path);
        let response = self.transport.execute(method, &uri, body.as_ref()).await?;
        Ok(Outcome::from(response))
    }
}

/// Strategy that records every call into a shared ledger
#[derive(Clone)]
pub struct RecordingRequest {
    base_uri: String,
    ledger: Arc<Mutex<OperationLedger>>,
    stopped: Arc<AtomicBool>,
}

impl RecordingRequest {
    pub fn new(base_uri: impl Into<String>, ledger: Arc<Mutex<OperationLedger>>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ledger,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Refuse further recording on this strategy and every rebased copy
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn ledger(&self) -> &Arc<Mutex<OperationLedger>> {
        &self.ledger
    }
}

impl fmt::Debug for RecordingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRequest")
            .field("base_uri", &self.base_uri)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[async_trait]
impl RestRequest for RecordingRequest {
    fn uri(&self) -> &str {
        &self.base_uri
    }

    fn with(&self, uri: &str) -> Arc<dyn RestRequest> {
        Arc::new(RecordingRequest {
            base_uri: join_uri(&self.base_uri, uri),
            ledger: self.ledger.clone(),
            stopped: self.stopped.clone(),
        })
    }

    fn is_recording(&self) -> bool {
        true
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> RestResult<Outcome> {
        if self.is_stopped() {
            return Err(RestError::BatchClosed);
        }
        Ok(self.ledger.lock().record(method, path, body, &self.base_uri))
    }
}
