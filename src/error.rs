//! Error types for the REST client

use thiserror::Error;

/// Errors that can occur when talking to a graph database REST server
#[derive(Error, Debug)]
pub enum RestError {
    /// Requested resource (node, relationship, property key) is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server body itself encoded a structured exception
    #[error("Server reported error: {message}")]
    ServerReported {
        message: String,
        exception: Option<String>,
    },

    /// The single batched round trip failed at the network layer
    #[error("Batch request failed: {0}")]
    BatchTransport(#[source] Box<RestError>),

    /// A response did not have the shape the operation expected
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// A direct operation got a status it cannot interpret
    #[error("Unexpected status {status}: {context}")]
    UnexpectedStatus { status: u16, context: String },

    /// A placeholder entity was read before its batch resolved it
    #[error("Entity is still unresolved: {0}")]
    Unresolved(String),

    /// `begin_batch` was called on a facade that is already recording
    #[error("Batches cannot be nested")]
    NestedBatch,

    /// An operation was recorded against a batch that has already ended
    #[error("Batch has already been executed")]
    BatchClosed,

    /// A batch response referenced an id the ledger never issued
    #[error("Unknown batch operation id {0}")]
    UnknownOperation(u64),

    /// Some batch entries failed to convert; the others were patched
    #[error("{} batch entries failed, first: {first}", failed.len())]
    PartialBatch {
        failed: Vec<u64>,
        first: Box<RestError>,
    },

    /// Operation is not available in the current request mode
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Caller passed an argument the server would reject
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RestResult<T> = Result<T, RestError>;

impl RestError {
    /// Whether this error means "the resource is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(self, RestError::NotFound(_))
    }

    /// Build a `ServerReported` error from an exception-shaped JSON body.
    ///
    /// The server answers failed operations with an object carrying
    /// `message`, `exception` and `stacktrace` keys.
    pub fn from_exception(body: &serde_json::Value) -> Self {
        let message = body
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        let exception = body
            .get("exception")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        RestError::ServerReported { message, exception }
    }
}

/// Whether a JSON value is the server's structured exception shape
pub fn is_exception_result(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .map(|map| map.contains_key("exception"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exception_detection() {
        let body = json!({
            "message": "Node[99] not found",
            "exception": "NodeNotFoundException",
            "stacktrace": []
        });
        assert!(is_exception_result(&body));
        assert!(!is_exception_result(&json!([{"id": 1}])));
        assert!(!is_exception_result(&json!({"self": "http://x/node/1"})));
    }

    #[test]
    fn test_from_exception() {
        let body = json!({"message": "boom", "exception": "BadInputException"});
        match RestError::from_exception(&body) {
            RestError::ServerReported { message, exception } => {
                assert_eq!(message, "boom");
                assert_eq!(exception.as_deref(), Some("BadInputException"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_partial_batch_display() {
        let err = RestError::PartialBatch {
            failed: vec![2, 5],
            first: Box::new(RestError::NotFound("node 9".to_string())),
        };
        assert_eq!(err.to_string(), "2 batch entries failed, first: Not found: node 9");
    }
}
