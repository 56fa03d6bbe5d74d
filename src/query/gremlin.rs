use serde_json::{json, Map, Value};
use tracing::debug;

use crate::api::RestApi;
use crate::error::{is_exception_result, RestError, RestResult};
use crate::request::RestRequest;

use super::{extract_table, extract_value, is_table_result, RecordBatch, ResultValue};

/// Gremlin plugin endpoint relative to the base URI
pub const GREMLIN_PATH: &str = "ext/GremlinPlugin/graphdb/execute_script";

/// Shape of a Gremlin script result
#[derive(Debug, Clone, PartialEq)]
pub enum GremlinResult {
    Table(RecordBatch),
    Values(Vec<ResultValue>),
}

impl GremlinResult {
    /// Flatten into a list of cells; tables yield their rows in order
    pub fn into_values(self) -> Vec<ResultValue> {
        match self {
            GremlinResult::Values(values) => values,
            GremlinResult::Table(batch) => batch
                .records
                .into_iter()
                .flat_map(|record| record.values().cloned().collect::<Vec<_>>())
                .collect(),
        }
    }
}

/// Runs Gremlin scripts through the server plugin
#[derive(Debug, Clone)]
pub struct GremlinEngine {
    api: RestApi,
}

impl GremlinEngine {
    pub fn new(api: RestApi) -> Self {
        Self { api }
    }

    pub async fn query(&self, script: &str, params: Option<Map<String, Value>>) -> RestResult<GremlinResult> {
        debug!("Gremlin: {}", script);
        let body = json!({
            "script": script,
            "params": Value::Object(params.unwrap_or_default()),
        });
        let outcome = self.api.direct().post(GREMLIN_PATH, body).await?;
        if outcome.status() == 500 {
            return Err(script_error(&outcome.to_value().unwrap_or(Value::Null), outcome.body()));
        }
        if !outcome.is_success() {
            return Err(outcome.error_for("gremlin script"));
        }

        let result = outcome.to_value()?;
        match &result {
            Value::Object(_) if is_exception_result(&result) => Err(RestError::from_exception(&result)),
            Value::Object(map) if is_table_result(map) => extract_table(map, &self.api).map(GremlinResult::Table),
            Value::Array(items) => items
                .iter()
                .map(|item| extract_value(item, &self.api))
                .collect::<RestResult<Vec<_>>>()
                .map(GremlinResult::Values),
            single => Ok(GremlinResult::Values(vec![extract_value(single, &self.api)?])),
        }
    }
}

/// A 500 answer carries either a structured exception or free text
fn script_error(result: &Value, raw: Option<&str>) -> RestError {
    if is_exception_result(result) {
        return RestError::from_exception(result);
    }
    RestError::ServerReported {
        message: raw.unwrap_or("gremlin script failed").to_string(),
        exception: None,
    }
}
