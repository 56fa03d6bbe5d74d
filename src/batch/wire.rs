//! Batch wire format
//!
//! Request: `[{"method": "POST", "to": "node", "body": {...}, "id": 1}, ...]`
//! Response: `[{"id": 1, "status": 201, "location": "...", "body": {...}}, ...]`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{is_exception_result, RestError, RestResult};
use crate::outcome::json_kind;
use crate::transport::Method;

/// Path of the batch endpoint relative to the base URI
pub const BATCH_PATH: &str = "batch";

/// One job in a batch request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub method: Method,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub id: u64,
}

/// One entry of a batch response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJobResult {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Interpret the body of a batch response.
///
/// A structured exception in place of the array fails the whole batch.
pub fn parse_batch_response(body: &Value) -> RestResult<Vec<BatchJobResult>> {
    if is_exception_result(body) {
        return Err(RestError::from_exception(body));
    }
    match body {
        Value::Array(_) => Ok(serde_json::from_value(body.clone())?),
        other => Err(RestError::ProtocolMismatch(format!(
            "batch response must be an array, got {}",
            json_kind(other)
        ))),
    }
}
