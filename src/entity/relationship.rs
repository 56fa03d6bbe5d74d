use serde_json::Value;
use std::ops::Deref;

use crate::converter::{ResolvedValue, UpdatableResult};
use crate::error::{RestError, RestResult};
use crate::types::{EntityKind, RelationshipType};

use super::{Entity, EntityHandle, Node};

/// A relationship in the remote graph
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Relationship(Entity);

impl Relationship {
    async fn structural_string(&self, key: &str) -> RestResult<String> {
        let structural = self.structural_data().await?;
        match structural.get(key) {
            Some(Value::String(value)) => Ok(value.clone()),
            _ => Err(RestError::ProtocolMismatch(format!(
                "relationship {} has no '{}' in its representation",
                self, key
            ))),
        }
    }

    pub async fn start_node(&self) -> RestResult<Node> {
        let uri = self.structural_string("start").await?;
        Ok(Node::from_entity(Entity::from_uri(EntityKind::Node, uri, &self.api())))
    }

    pub async fn end_node(&self) -> RestResult<Node> {
        let uri = self.structural_string("end").await?;
        Ok(Node::from_entity(Entity::from_uri(EntityKind::Node, uri, &self.api())))
    }

    /// The node at the other end from `node`
    pub async fn other_node(&self, node: &Node) -> RestResult<Node> {
        let start = self.start_node().await?;
        if &start == node {
            return self.end_node().await;
        }
        let end = self.end_node().await?;
        if &end == node {
            return Ok(start);
        }
        Err(RestError::InvalidArgument(format!(
            "{} is neither start nor end of relationship {}",
            node, self
        )))
    }

    pub async fn relationship_type(&self) -> RestResult<RelationshipType> {
        self.structural_string("type").await.map(RelationshipType::new)
    }

    pub async fn is_type(&self, rel_type: &RelationshipType) -> RestResult<bool> {
        Ok(&self.relationship_type().await? == rel_type)
    }
}

impl EntityHandle for Relationship {
    const KIND: EntityKind = EntityKind::Relationship;

    fn from_entity(entity: Entity) -> Self {
        Relationship(entity)
    }

    fn entity(&self) -> &Entity {
        &self.0
    }
}

impl Deref for Relationship {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.0
    }
}

impl UpdatableResult for Relationship {
    fn update_from(&self, resolved: ResolvedValue) -> RestResult<()> {
        self.0.update_from(resolved)
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
