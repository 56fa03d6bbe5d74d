//! Remote entities and their local cache
//!
//! An [`Entity`] is a shared handle onto the cached state of one node or
//! relationship. Clones share the state, so when a batch resolves a
//! placeholder every clone the caller holds sees the real entity.
//!
//! Structural data (`self`, `start`, `end`, `type`, ...) is fetched once.
//! Property data is refetched when older than the facade's refetch
//! interval.

pub mod node;
pub mod property;
pub mod relationship;

pub use node::Node;
pub use property::{properties_to_json, PropertyMap, PropertyValue};
pub use relationship::Relationship;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::api::RestApi;
use crate::converter::{ResolvedValue, UpdatableResult};
use crate::error::{RestError, RestResult};
use crate::outcome::json_kind;
use crate::types::{entity_id, EntityKind};

/// Typed wrapper around an [`Entity`]
pub trait EntityHandle: Clone + Send + Sync + fmt::Debug + 'static {
    const KIND: EntityKind;

    fn from_entity(entity: Entity) -> Self;

    fn entity(&self) -> &Entity;
}

/// Resolved identity and whatever data came with it
#[derive(Clone)]
pub struct ResolvedEntity {
    uri: String,
    structural: Option<Map<String, Value>>,
    properties: Option<Map<String, Value>>,
    api: RestApi,
}

impl ResolvedEntity {
    /// From a full representation (`self`, `data`, ...)
    pub fn from_representation(map: Map<String, Value>, api: &RestApi) -> RestResult<Self> {
        let uri = match map.get("self") {
            Some(Value::String(uri)) => uri.clone(),
            Some(other) => {
                return Err(RestError::ProtocolMismatch(format!(
                    "entity 'self' must be a string, got {}",
                    json_kind(other)
                )))
            }
            None => {
                return Err(RestError::ProtocolMismatch(
                    "entity representation has no 'self' uri".to_string(),
                ))
            }
        };
        let properties = match map.get("data") {
            Some(Value::Object(data)) => Some(data.clone()),
            _ => None,
        };
        Ok(Self {
            uri,
            structural: Some(map),
            properties,
            api: api.clone(),
        })
    }

    /// Identity only; everything else is fetched on first use
    pub fn from_uri(uri: impl Into<String>, api: &RestApi) -> Self {
        Self {
            uri: uri.into(),
            structural: None,
            properties: None,
            api: api.clone(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn structural(&self) -> Option<&Map<String, Value>> {
        self.structural.as_ref()
    }

    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.properties.as_ref()
    }
}

impl fmt::Debug for ResolvedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedEntity")
            .field("uri", &self.uri)
            .field("structural", &self.structural.is_some())
            .field("properties", &self.properties)
            .finish()
    }
}

enum EntityState {
    /// Created inside a batch that has not been executed yet
    Unresolved { batch_id: u64, api: RestApi },
    Resolved {
        entity: ResolvedEntity,
        fetched_at: Option<Instant>,
    },
}

enum PropertyLookup {
    Fresh(Map<String, Value>),
    Refetch(RestApi),
}

/// Shared handle onto one remote node or relationship
///
/// Resolved handles compare and hash by kind and URI. A placeholder
/// compares by identity and hashes its shared state until its batch
/// resolves it, after which it hashes its URI. Do not keep placeholders
/// as `HashMap`/`HashSet` keys across batch execution; key them once
/// the batch has run.
#[derive(Clone)]
pub struct Entity {
    kind: EntityKind,
    state: Arc<RwLock<EntityState>>,
}

impl Entity {
    /// Placeholder for the result of batch job `batch_id`
    pub fn unresolved(kind: EntityKind, batch_id: u64, api: &RestApi) -> Self {
        Self::with_state(
            kind,
            EntityState::Unresolved {
                batch_id,
                api: api.clone(),
            },
        )
    }

    /// Lazy entity known only by its URI
    pub fn from_uri(kind: EntityKind, uri: impl Into<String>, api: &RestApi) -> Self {
        Self::from_resolved(kind, ResolvedEntity::from_uri(uri, api))
    }

    /// Entity from a full JSON representation
    pub fn from_representation(kind: EntityKind, map: Map<String, Value>, api: &RestApi) -> RestResult<Self> {
        Ok(Self::from_resolved(kind, ResolvedEntity::from_representation(map, api)?))
    }

    pub fn from_resolved(kind: EntityKind, entity: ResolvedEntity) -> Self {
        let fetched_at = entity.properties.as_ref().map(|_| Instant::now());
        Self::with_state(kind, EntityState::Resolved { entity, fetched_at })
    }

    fn with_state(kind: EntityKind, state: EntityState) -> Self {
        Self {
            kind,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Absolute URI; `None` while unresolved
    pub fn uri(&self) -> Option<String> {
        match &*self.state.read() {
            EntityState::Resolved { entity, .. } => Some(entity.uri.clone()),
            EntityState::Unresolved { .. } => None,
        }
    }

    /// Numeric id taken from the URI
    pub fn id(&self) -> Option<u64> {
        self.uri().as_deref().and_then(entity_id)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.read(), EntityState::Resolved { .. })
    }

    /// Batch job this placeholder waits for
    pub fn batch_id(&self) -> Option<u64> {
        match &*self.state.read() {
            EntityState::Unresolved { batch_id, .. } => Some(*batch_id),
            EntityState::Resolved { .. } => None,
        }
    }

    /// Address to use inside requests: the URI, or the `{n}` job
    /// reference the batch endpoint substitutes
    pub(crate) fn reference(&self) -> String {
        match &*self.state.read() {
            EntityState::Resolved { entity, .. } => entity.uri.clone(),
            EntityState::Unresolved { batch_id, .. } => format!("{{{}}}", batch_id),
        }
    }

    /// Facade this entity issues its requests through
    pub fn api(&self) -> RestApi {
        match &*self.state.read() {
            EntityState::Resolved { entity, .. } => entity.api.clone(),
            EntityState::Unresolved { api, .. } => api.clone(),
        }
    }

    fn unresolved_error(&self, batch_id: u64) -> RestError {
        RestError::Unresolved(format!("{} created by batch job {}", self.kind, batch_id))
    }

    pub(crate) fn require_uri(&self) -> RestResult<String> {
        match &*self.state.read() {
            EntityState::Resolved { entity, .. } => Ok(entity.uri.clone()),
            EntityState::Unresolved { batch_id, .. } => Err(self.unresolved_error(*batch_id)),
        }
    }

    /// Drop cached property data so the next read refetches it
    pub fn invalidate(&self) {
        if let EntityState::Resolved { entity, fetched_at } = &mut *self.state.write() {
            entity.properties = None;
            *fetched_at = None;
        }
    }

    /// Adopt a resolved identity in place
    pub(crate) fn patch(&self, resolved: ResolvedEntity) {
        debug!("Resolved {} to {}", self, resolved.uri);
        *self.state.write() = EntityState::Resolved {
            entity: resolved,
            fetched_at: Some(Instant::now()),
        };
    }

    fn cached_properties(&self) -> RestResult<PropertyLookup> {
        match &*self.state.read() {
            EntityState::Unresolved { batch_id, .. } => Err(self.unresolved_error(*batch_id)),
            EntityState::Resolved { entity, fetched_at } => {
                let fresh = fetched_at
                    .map(|at| at.elapsed() <= entity.api.refetch_interval())
                    .unwrap_or(false);
                match (&entity.properties, fresh) {
                    (Some(properties), true) => Ok(PropertyLookup::Fresh(properties.clone())),
                    _ => Ok(PropertyLookup::Refetch(entity.api.clone())),
                }
            }
        }
    }

    /// Property data, refetched when stale
    pub async fn property_data(&self) -> RestResult<Map<String, Value>> {
        let api = match self.cached_properties()? {
            PropertyLookup::Fresh(properties) => return Ok(properties),
            PropertyLookup::Refetch(api) => api,
        };
        let fresh = api.properties_of(self).await?;
        if let EntityState::Resolved { entity, fetched_at } = &mut *self.state.write() {
            entity.properties = Some(fresh.clone());
            *fetched_at = Some(Instant::now());
        }
        Ok(fresh)
    }

    /// Structural data, fetched on first use
    pub async fn structural_data(&self) -> RestResult<Map<String, Value>> {
        let (uri, api) = match &*self.state.read() {
            EntityState::Unresolved { batch_id, .. } => return Err(self.unresolved_error(*batch_id)),
            EntityState::Resolved { entity, .. } => match &entity.structural {
                Some(structural) => return Ok(structural.clone()),
                None => (entity.uri.clone(), entity.api.clone()),
            },
        };
        let structural = api.structural_data_of(&uri).await?;
        if let EntityState::Resolved { entity, .. } = &mut *self.state.write() {
            entity.structural = Some(structural.clone());
        }
        Ok(structural)
    }

    async fn property_value(&self, key: &str) -> RestResult<Option<PropertyValue>> {
        let properties = self.property_data().await?;
        match properties.get(key) {
            Some(value) => PropertyValue::from_json(key, value),
            None => Ok(None),
        }
    }

    /// Property value; `NotFound` when absent
    pub async fn get_property(&self, key: &str) -> RestResult<PropertyValue> {
        self.property_value(key)
            .await?
            .ok_or_else(|| RestError::NotFound(format!("'{}' on {}", key, self)))
    }

    /// Property value or `default` when absent
    pub async fn get_property_or(&self, key: &str, default: impl Into<PropertyValue>) -> RestResult<PropertyValue> {
        Ok(self.property_value(key).await?.unwrap_or_else(|| default.into()))
    }

    pub async fn has_property(&self, key: &str) -> RestResult<bool> {
        Ok(self.property_data().await?.contains_key(key))
    }

    pub async fn property_keys(&self) -> RestResult<Vec<String>> {
        Ok(self.property_data().await?.keys().cloned().collect())
    }

    pub async fn property_values(&self) -> RestResult<Vec<PropertyValue>> {
        let properties = self.property_data().await?;
        let mut values = Vec::with_capacity(properties.len());
        for (key, value) in &properties {
            if let Some(value) = PropertyValue::from_json(key, value)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    pub async fn set_property(&self, key: &str, value: impl Into<PropertyValue>) -> RestResult<()> {
        self.api().set_property_on_entity(self, key, value.into()).await
    }

    /// Remove a property, returning its previous value when known
    pub async fn remove_property(&self, key: &str) -> RestResult<Option<PropertyValue>> {
        let previous = if self.is_resolved() {
            self.property_value(key).await?
        } else {
            None
        };
        self.api().remove_property_from_entity(self, key).await?;
        Ok(previous)
    }

    pub async fn delete(&self) -> RestResult<()> {
        self.api().delete_entity(self).await
    }
}

impl UpdatableResult for Entity {
    fn update_from(&self, resolved: ResolvedValue) -> RestResult<()> {
        match resolved {
            ResolvedValue::Entity(entity) => {
                self.patch(entity);
                Ok(())
            }
            ResolvedValue::Refresh => {
                self.invalidate();
                Ok(())
            }
            other => Err(RestError::ProtocolMismatch(format!(
                "cannot update a {} from an {}",
                self.kind,
                other.kind_name()
            ))),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }
        if Arc::ptr_eq(&self.state, &other.state) {
            return true;
        }
        match (self.uri(), other.uri()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        match self.uri() {
            Some(uri) => uri.hash(state),
            None => (Arc::as_ptr(&self.state) as usize).hash(state),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("kind", &self.kind)
            .field("reference", &self.reference())
            .finish()
    }
}
