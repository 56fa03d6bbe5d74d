//! Cypher and Gremlin endpoints
//!
//! Both plugins answer with JSON in which entities appear as full
//! representations. Cells carrying a `self` URI become [`Node`] or
//! [`Relationship`] handles, everything else stays JSON.

pub mod cypher;
pub mod gremlin;
pub mod record;

pub use cypher::CypherEngine;
pub use gremlin::{GremlinEngine, GremlinResult};
pub use record::{Record, RecordBatch, ResultValue};

use serde_json::{Map, Value};

use crate::api::RestApi;
use crate::converter::representation_kind;
use crate::entity::{Entity, EntityHandle, Node, Relationship};
use crate::error::{RestError, RestResult};
use crate::outcome::json_kind;
use crate::types::EntityKind;

/// Convert one JSON cell
pub(crate) fn extract_value(value: &Value, api: &RestApi) -> RestResult<ResultValue> {
    match value {
        Value::Null => Ok(ResultValue::Null),
        Value::Array(items) => items
            .iter()
            .map(|item| extract_value(item, api))
            .collect::<RestResult<Vec<_>>>()
            .map(ResultValue::List),
        Value::Object(map) => match representation_kind(map) {
            Some(EntityKind::Node) => Ok(ResultValue::Node(Node::from_entity(
                Entity::from_representation(EntityKind::Node, map.clone(), api)?,
            ))),
            Some(EntityKind::Relationship) => Ok(ResultValue::Relationship(Relationship::from_entity(
                Entity::from_representation(EntityKind::Relationship, map.clone(), api)?,
            ))),
            None => Ok(ResultValue::Value(value.clone())),
        },
        other => Ok(ResultValue::Value(other.clone())),
    }
}

/// Whether a result is a `{columns, data}` table
pub(crate) fn is_table_result(map: &Map<String, Value>) -> bool {
    map.contains_key("columns") && map.contains_key("data")
}

/// Convert a `{columns: [...], data: [[...], ...]}` table
pub(crate) fn extract_table(map: &Map<String, Value>, api: &RestApi) -> RestResult<RecordBatch> {
    let columns = match map.get("columns") {
        Some(Value::Array(columns)) => columns
            .iter()
            .map(|c| match c {
                Value::String(name) => Ok(name.clone()),
                other => Err(RestError::ProtocolMismatch(format!(
                    "column name must be a string, got {}",
                    json_kind(other)
                ))),
            })
            .collect::<RestResult<Vec<_>>>()?,
        _ => return Err(RestError::ProtocolMismatch("result table has no columns".to_string())),
    };

    let rows = match map.get("data") {
        Some(Value::Array(rows)) => rows,
        _ => return Err(RestError::ProtocolMismatch("result table has no data".to_string())),
    };

    let mut batch = RecordBatch::new(columns.clone());
    for row in rows {
        let cells = row.as_array().ok_or_else(|| {
            RestError::ProtocolMismatch(format!("result row must be an array, got {}", json_kind(row)))
        })?;
        if cells.len() != columns.len() {
            return Err(RestError::ProtocolMismatch(format!(
                "result row has {} cells for {} columns",
                cells.len(),
                columns.len()
            )));
        }
        let mut record = Record::new();
        for (column, cell) in columns.iter().zip(cells) {
            record.bind(column.clone(), extract_value(cell, api)?);
        }
        batch.push(record);
    }
    Ok(batch)
}
