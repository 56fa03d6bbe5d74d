//! Normalized result of one REST operation
//!
//! An operation either ran now (`Immediate`, carrying status, location
//! and body) or was recorded into a batch (`Deferred`, carrying only the
//! ledger id that will later be correlated with the server's answer).

use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::batch::wire::BatchJobResult;
use crate::error::{is_exception_result, RestError, RestResult};
use crate::transport::TransportResponse;

/// Result of a request made through a request strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Immediate {
        status: u16,
        location: Option<String>,
        body: Option<String>,
    },
    Deferred {
        batch_id: u64,
    },
}

impl Outcome {
    pub fn deferred(batch_id: u64) -> Self {
        Outcome::Deferred { batch_id }
    }

    /// Normalize a batch response entry; entries without a status are
    /// treated as 200 and the body is re-serialized to JSON text
    pub fn from_batch_entry(entry: &BatchJobResult) -> Self {
        let body = match &entry.body {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.to_string()),
        };
        Outcome::Immediate {
            status: entry.status.unwrap_or(200),
            location: entry.location.clone(),
            body,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Deferred { .. })
    }

    pub fn batch_id(&self) -> Option<u64> {
        match self {
            Outcome::Deferred { batch_id } => Some(*batch_id),
            Outcome::Immediate { .. } => None,
        }
    }

    /// Wire status; 0 for deferred outcomes
    pub fn status(&self) -> u16 {
        match self {
            Outcome::Immediate { status, .. } => *status,
            Outcome::Deferred { .. } => 0,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Outcome::Immediate { location, .. } => location.as_deref(),
            Outcome::Deferred { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Outcome::Immediate { body, .. } => body.as_deref(),
            Outcome::Deferred { .. } => None,
        }
    }

    pub fn status_is(&self, status: StatusCode) -> bool {
        self.status() == status.as_u16()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// Parse the body as JSON; an absent or blank body is `null`
    pub fn to_value(&self) -> RestResult<Value> {
        match self.body() {
            Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(text)?),
            _ => Ok(Value::Null),
        }
    }

    /// Parse the body as a JSON object
    pub fn to_map(&self) -> RestResult<Map<String, Value>> {
        match self.to_value()? {
            Value::Object(map) => Ok(map),
            other => Err(RestError::ProtocolMismatch(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Turn a failed status into an error, preferring the server's own
    /// exception message when the body carries one
    pub fn error_for(&self, context: &str) -> RestError {
        if let Ok(value) = self.to_value() {
            if is_exception_result(&value) {
                return RestError::from_exception(&value);
            }
        }
        if self.status_is(StatusCode::NOT_FOUND) {
            return RestError::NotFound(context.to_string());
        }
        RestError::UnexpectedStatus {
            status: self.status(),
            context: context.to_string(),
        }
    }
}

impl From<TransportResponse> for Outcome {
    fn from(response: TransportResponse) -> Self {
        let body = if response.status == StatusCode::NO_CONTENT.as_u16() {
            None
        } else {
            response.body
        };
        Outcome::Immediate {
            status: response.status,
            location: response.location,
            body,
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
