use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::RestApi;
use crate::error::{is_exception_result, RestError, RestResult};
use crate::outcome::json_kind;
use crate::request::RestRequest;

use super::{extract_table, RecordBatch};

/// Cypher plugin endpoint relative to the base URI
pub const CYPHER_PATH: &str = "ext/CypherPlugin/graphdb/execute_query";

/// Runs Cypher statements through the server plugin
#[derive(Debug, Clone)]
pub struct CypherEngine {
    api: RestApi,
}

impl CypherEngine {
    pub fn new(api: RestApi) -> Self {
        Self { api }
    }

    pub async fn query(&self, statement: &str, params: Option<Map<String, Value>>) -> RestResult<RecordBatch> {
        debug!("Cypher: {}", statement);
        let body = json!({
            "query": statement,
            "params": Value::Object(params.unwrap_or_default()),
        });
        let outcome = self.api.direct().post(CYPHER_PATH, body).await?;
        let result = outcome.to_value()?;
        if is_exception_result(&result) {
            return Err(RestError::from_exception(&result));
        }
        if !outcome.is_success() {
            return Err(outcome.error_for("cypher query"));
        }
        match &result {
            Value::Object(map) => extract_table(map, &self.api),
            other => Err(RestError::ProtocolMismatch(format!(
                "cypher result must be a table, got {}",
                json_kind(other)
            ))),
        }
    }
}
