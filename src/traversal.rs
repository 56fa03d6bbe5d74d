//! Server-side traversals
//!
//! A [`TraversalDescription`] is built locally and posted to
//! `<node>/traverse/fullpath`; the server answers with one JSON path per
//! match.

use serde_json::{json, Map, Value};

use crate::api::RestApi;
use crate::entity::{Entity, EntityHandle, Node, Relationship};
use crate::error::{RestError, RestResult};
use crate::outcome::json_kind;
use crate::types::{Direction, EntityKind, RelationshipType};

/// Traversal result format used by [`RestApi::traverse`]
pub const FULLPATH: &str = "fullpath";

/// Uniqueness rule applied while traversing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    None,
    NodeGlobal,
    RelationshipGlobal,
    NodePath,
    RelationshipPath,
    NodeRecent,
    RelationshipRecent,
}

impl Uniqueness {
    /// Wire name: lower case words separated by spaces
    pub fn wire_name(&self) -> &'static str {
        match self {
            Uniqueness::None => "none",
            Uniqueness::NodeGlobal => "node global",
            Uniqueness::RelationshipGlobal => "relationship global",
            Uniqueness::NodePath => "node path",
            Uniqueness::RelationshipPath => "relationship path",
            Uniqueness::NodeRecent => "node recent",
            Uniqueness::RelationshipRecent => "relationship recent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    JavaScript,
}

impl ScriptLanguage {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ScriptLanguage::JavaScript => "javascript",
        }
    }
}

/// When to stop expanding a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneEvaluator {
    /// Never prune
    None,
    /// Stop below the given depth
    MaxDepth(u32),
    Script { language: ScriptLanguage, body: String },
}

/// Which visited paths are returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnFilter {
    All,
    AllButStartNode,
    Script { language: ScriptLanguage, body: String },
}

/// Builder for the JSON traversal description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversalDescription {
    description: Map<String, Value>,
}

impl TraversalDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniqueness(self, uniqueness: Uniqueness) -> Self {
        self.add("uniqueness", json!(uniqueness.wire_name()))
    }

    /// Uniqueness with a parameter, e.g. the window of a recent rule
    pub fn uniqueness_with(self, uniqueness: Uniqueness, value: impl Into<Value>) -> Self {
        self.add(
            "uniqueness",
            json!({"name": uniqueness.wire_name(), "value": value.into()}),
        )
    }

    pub fn prune(self, evaluator: PruneEvaluator) -> Self {
        match evaluator {
            PruneEvaluator::None => self.add("prune_evaluator", json!({"language": "builtin", "name": "none"})),
            PruneEvaluator::MaxDepth(depth) => self.max_depth(depth),
            PruneEvaluator::Script { language, body } => self.add(
                "prune_evaluator",
                json!({"language": language.wire_name(), "body": body}),
            ),
        }
    }

    pub fn filter(self, filter: ReturnFilter) -> Self {
        let value = match filter {
            ReturnFilter::All => json!({"language": "builtin", "name": "all"}),
            ReturnFilter::AllButStartNode => json!({"language": "builtin", "name": "all_but_start_node"}),
            ReturnFilter::Script { language, body } => json!({"language": language.wire_name(), "body": body}),
        };
        self.add("return_filter", value)
    }

    pub fn max_depth(self, depth: u32) -> Self {
        self.add("max_depth", json!(depth))
    }

    pub fn depth_first(self) -> Self {
        self.add("order", json!("depth_first"))
    }

    pub fn breadth_first(self) -> Self {
        self.add("order", json!("breadth_first"))
    }

    /// Follow relationships of a type, in any direction when `None`
    pub fn relationships(mut self, rel_type: impl Into<RelationshipType>, direction: Option<Direction>) -> Self {
        let mut entry = Map::new();
        entry.insert("type".to_string(), json!(rel_type.into().name()));
        if let Some(direction) = direction {
            entry.insert("direction".to_string(), json!(direction.short_name()));
        }
        let entry = Value::Object(entry);

        let list = self
            .description
            .entry("relationships".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = list {
            if !items.contains(&entry) {
                items.push(entry);
            }
        }
        self
    }

    fn add(mut self, key: &str, value: Value) -> Self {
        self.description.insert(key.to_string(), value);
        self
    }

    /// JSON body posted to the traverse endpoint
    pub fn to_json(&self) -> Value {
        Value::Object(self.description.clone())
    }
}

/// One path returned by a traversal
#[derive(Debug, Clone)]
pub struct Path {
    pub start: Node,
    pub end: Node,
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    pub length: usize,
}

impl Path {
    pub fn last_relationship(&self) -> Option<&Relationship> {
        self.relationships.last()
    }

    pub(crate) fn from_value(value: &Value, api: &RestApi) -> RestResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(RestError::ProtocolMismatch(format!(
                    "traversal path must be an object, got {}",
                    json_kind(other)
                )))
            }
        };
        let field = |key: &str| {
            map.get(key)
                .ok_or_else(|| RestError::ProtocolMismatch(format!("traversal path has no '{}'", key)))
        };

        let start = Node::from_entity(entity_ref(EntityKind::Node, field("start")?, api)?);
        let end = Node::from_entity(entity_ref(EntityKind::Node, field("end")?, api)?);
        let nodes = entity_refs(EntityKind::Node, map.get("nodes"), api)?
            .into_iter()
            .map(Node::from_entity)
            .collect();
        let relationships: Vec<Relationship> = entity_refs(EntityKind::Relationship, map.get("relationships"), api)?
            .into_iter()
            .map(Relationship::from_entity)
            .collect();
        let length = match map.get("length").and_then(Value::as_u64) {
            Some(length) => length as usize,
            None => relationships.len(),
        };

        Ok(Self {
            start,
            end,
            nodes,
            relationships,
            length,
        })
    }
}

/// Paths carry either bare URIs or full representations
fn entity_ref(kind: EntityKind, value: &Value, api: &RestApi) -> RestResult<Entity> {
    match value {
        Value::String(uri) => Ok(Entity::from_uri(kind, uri.clone(), api)),
        Value::Object(map) => Entity::from_representation(kind, map.clone(), api),
        other => Err(RestError::ProtocolMismatch(format!(
            "expected a {} reference, got {}",
            kind,
            json_kind(other)
        ))),
    }
}

fn entity_refs(kind: EntityKind, value: Option<&Value>, api: &RestApi) -> RestResult<Vec<Entity>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|item| entity_ref(kind, item, api)).collect(),
        Some(other) => Err(RestError::ProtocolMismatch(format!(
            "expected a list of {} references, got {}",
            kind,
            json_kind(other)
        ))),
    }
}
