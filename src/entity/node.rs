use std::ops::Deref;

use crate::batch::deferred::Deferred;
use crate::converter::{ResolvedValue, UpdatableResult};
use crate::error::RestResult;
use crate::traversal::{Path, TraversalDescription};
use crate::types::{Direction, EntityKind, RelationshipType};

use super::{Entity, EntityHandle, PropertyMap, Relationship};

/// A node in the remote graph
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Node(Entity);

impl Node {
    /// Create a relationship from this node to `end`
    pub async fn create_relationship_to(
        &self,
        end: &Node,
        rel_type: impl Into<RelationshipType>,
        properties: Option<PropertyMap>,
    ) -> RestResult<Relationship> {
        self.api()
            .create_relationship(self, end, rel_type.into(), properties)
            .await
    }

    /// Relationships in `direction`, optionally restricted to `types`.
    /// Inside a batch the list is filled when the batch executes.
    pub async fn relationships(
        &self,
        direction: Direction,
        types: &[RelationshipType],
    ) -> RestResult<Deferred<Vec<Relationship>>> {
        self.api().relationships(self, direction, types).await
    }

    pub async fn traverse(&self, description: &TraversalDescription) -> RestResult<Vec<Path>> {
        self.api().traverse(self, description).await
    }
}

impl EntityHandle for Node {
    const KIND: EntityKind = EntityKind::Node;

    fn from_entity(entity: Entity) -> Self {
        Node(entity)
    }

    fn entity(&self) -> &Entity {
        &self.0
    }
}

impl Deref for Node {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.0
    }
}

impl UpdatableResult for Node {
    fn update_from(&self, resolved: ResolvedValue) -> RestResult<()> {
        self.0.update_from(resolved)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
