//! Result converters
//!
//! A converter turns the outcome of one operation into the value a
//! placeholder should adopt. The converter is chosen when the operation
//! is issued and runs either immediately (direct mode) or when the batch
//! response is demultiplexed.

use serde_json::{Map, Value};
use std::fmt;

use crate::api::RestApi;
use crate::entity::{Entity, ResolvedEntity};
use crate::error::{RestError, RestResult};
use crate::outcome::{json_kind, Outcome};
use crate::types::EntityKind;

/// Closed set of outcome → value conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultConverter {
    /// Single node or relationship representation (or `Location` only)
    Entity(EntityKind),
    /// Array of relationship representations
    RelationshipList,
    /// Index lookup result; anything but 200 means no hits
    IndexHits(EntityKind),
    /// Successful property write; the target should refetch
    PropertyRefresher,
}

/// Value produced by a converter
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Entity(ResolvedEntity),
    Entities(Vec<Entity>),
    Refresh,
}

impl ResolvedValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResolvedValue::Entity(_) => "entity",
            ResolvedValue::Entities(_) => "entity list",
            ResolvedValue::Refresh => "refresh",
        }
    }
}

/// A placeholder that can adopt a converted value
pub trait UpdatableResult: Send + Sync {
    fn update_from(&self, resolved: ResolvedValue) -> RestResult<()>;
}

impl ResultConverter {
    pub fn convert(&self, outcome: &Outcome, api: &RestApi) -> RestResult<ResolvedValue> {
        if outcome.is_deferred() {
            return Err(RestError::Unresolved(format!(
                "cannot convert the deferred outcome of batch job {}",
                outcome.batch_id().unwrap_or_default()
            )));
        }
        match self {
            ResultConverter::Entity(kind) => {
                if !outcome.is_success() {
                    return Err(outcome.error_for(&format!("{} representation", kind)));
                }
                entity_from_outcome(*kind, outcome, api).map(ResolvedValue::Entity)
            }
            ResultConverter::RelationshipList => {
                if !outcome.is_success() {
                    return Err(outcome.error_for("relationship listing"));
                }
                entities_from_value(EntityKind::Relationship, &outcome.to_value()?, api)
                    .map(ResolvedValue::Entities)
            }
            ResultConverter::IndexHits(kind) => {
                if outcome.status() != 200 {
                    return Ok(ResolvedValue::Entities(Vec::new()));
                }
                entities_from_value(*kind, &outcome.to_value()?, api).map(ResolvedValue::Entities)
            }
            ResultConverter::PropertyRefresher => {
                if !outcome.is_success() {
                    return Err(outcome.error_for("property update"));
                }
                Ok(ResolvedValue::Refresh)
            }
        }
    }
}

impl fmt::Display for ResultConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultConverter::Entity(kind) => write!(f, "{} extractor", kind),
            ResultConverter::RelationshipList => write!(f, "relationship list"),
            ResultConverter::IndexHits(kind) => write!(f, "{} index hits", kind),
            ResultConverter::PropertyRefresher => write!(f, "property refresher"),
        }
    }
}

/// A full representation when the body has one, otherwise a lazy entity
/// addressed by the `Location` header
fn entity_from_outcome(kind: EntityKind, outcome: &Outcome, api: &RestApi) -> RestResult<ResolvedEntity> {
    if let Value::Object(map) = outcome.to_value()? {
        if map.contains_key("self") {
            return ResolvedEntity::from_representation(map, api);
        }
    }
    match outcome.location() {
        Some(location) => Ok(ResolvedEntity::from_uri(location, api)),
        None => Err(RestError::ProtocolMismatch(format!(
            "{} result carries neither a representation nor a location",
            kind
        ))),
    }
}

/// Convert an array of representations into entities of one kind
pub(crate) fn entities_from_value(kind: EntityKind, value: &Value, api: &RestApi) -> RestResult<Vec<Entity>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Entity::from_representation(kind, map.clone(), api),
                other => Err(RestError::ProtocolMismatch(format!(
                    "expected a {} representation, got {}",
                    kind,
                    json_kind(other)
                ))),
            })
            .collect(),
        other => Err(RestError::ProtocolMismatch(format!(
            "expected an array of {} representations, got {}",
            kind,
            json_kind(other)
        ))),
    }
}

/// Guess the kind of a representation found in a query result
pub(crate) fn representation_kind(map: &Map<String, Value>) -> Option<EntityKind> {
    let uri = map.get("self")?.as_str()?;
    if map.contains_key("start") && map.contains_key("end") && map.contains_key("type") {
        Some(EntityKind::Relationship)
    } else if uri.contains("/relationship/") {
        Some(EntityKind::Relationship)
    } else {
        Some(EntityKind::Node)
    }
}
