//! The REST facade
//!
//! [`RestApi`] is the single entry point for callers. Every mutation
//! goes through its request strategy, so the same facade code either
//! talks to the server now or records into a batch. Pure reads always
//! use the direct strategy.

use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::coordinator::BatchCoordinator;
use crate::batch::deferred::Deferred;
use crate::config::ClientConfig;
use crate::converter::{ResolvedValue, ResultConverter, UpdatableResult};
use crate::entity::{properties_to_json, Entity, EntityHandle, Node, PropertyMap, PropertyValue, Relationship};
use crate::error::{RestError, RestResult};
use crate::index::{Index, IndexConfig, IndexHits, IndexInfo, IndexManager};
use crate::outcome::{json_kind, Outcome};
use crate::query::{CypherEngine, GremlinEngine, GremlinResult, RecordBatch};
use crate::request::{encode_segment, ExecutingRequest, RecordingRequest, RestRequest};
use crate::transport::{HttpTransport, Transport};
use crate::traversal::{Path, TraversalDescription, FULLPATH};
use crate::types::{entity_id, Direction, EntityKind, RelationshipType};

/// Client facade over a graph database REST endpoint
#[derive(Clone, Debug)]
pub struct RestApi {
    request: Arc<dyn RestRequest>,
    direct: ExecutingRequest,
    recording: Option<RecordingRequest>,
    refetch_interval: Duration,
}

fn expect_success(outcome: &Outcome, context: &str) -> RestResult<()> {
    if outcome.is_deferred() || outcome.is_success() {
        Ok(())
    } else {
        Err(outcome.error_for(context))
    }
}

impl RestApi {
    /// Connect over HTTP with the given configuration
    pub fn new(config: &ClientConfig) -> RestResult<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::with_transport(config.base_uri.clone(), transport).with_refetch_interval(config.refetch_interval()))
    }

    /// Connect using `RESTGRAPH_*` environment overrides on the defaults
    pub fn from_env() -> RestResult<Self> {
        Self::new(&ClientConfig::default().with_env_overrides()?)
    }

    /// Facade over an arbitrary transport
    pub fn with_transport(base_uri: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let direct = ExecutingRequest::new(base_uri, transport);
        Self {
            request: Arc::new(direct.clone()),
            direct,
            recording: None,
            refetch_interval: ClientConfig::default().refetch_interval(),
        }
    }

    /// Facade recording into a batch; reads still go to `self`'s transport
    pub(crate) fn recording_child(&self, recording: RecordingRequest) -> Self {
        Self {
            request: Arc::new(recording.clone()),
            direct: self.direct.clone(),
            recording: Some(recording),
            refetch_interval: self.refetch_interval,
        }
    }

    /// Facade that executes every request directly. Entities returned by
    /// reads are bound to it, so they stay usable after a batch ends.
    pub(crate) fn executing(&self) -> Self {
        Self {
            request: Arc::new(self.direct.clone()),
            direct: self.direct.clone(),
            recording: None,
            refetch_interval: self.refetch_interval,
        }
    }

    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    pub fn refetch_interval(&self) -> Duration {
        self.refetch_interval
    }

    pub fn base_uri(&self) -> &str {
        self.direct.uri()
    }

    pub fn is_recording(&self) -> bool {
        self.request.is_recording()
    }

    /// Strategy used for mutations
    pub fn request(&self) -> &Arc<dyn RestRequest> {
        &self.request
    }

    pub(crate) fn direct(&self) -> &ExecutingRequest {
        &self.direct
    }

    /// Address of an entity for use in a request. Placeholders are only
    /// addressable while recording, as `{n}` job references.
    fn target_reference(&self, entity: &Entity) -> RestResult<String> {
        match entity.uri() {
            Some(uri) => Ok(uri),
            None if self.is_recording() => Ok(entity.reference()),
            None => entity.require_uri(),
        }
    }

    fn bind(&self, batch_id: u64, target: Arc<dyn UpdatableResult>, converter: ResultConverter) -> RestResult<()> {
        let recording = self.recording.as_ref().ok_or_else(|| {
            RestError::Unsupported(format!("deferred outcome {} outside of a batch", batch_id))
        })?;
        recording.ledger().lock().attach_result(batch_id, target, converter)
    }

    /// Entity produced by a mutation: a bound placeholder while
    /// recording, otherwise converted from the response
    fn entity_result(&self, kind: EntityKind, outcome: Outcome) -> RestResult<Entity> {
        if let Some(batch_id) = outcome.batch_id() {
            let entity = Entity::unresolved(kind, batch_id, self);
            self.bind(batch_id, Arc::new(entity.clone()), ResultConverter::Entity(kind))?;
            return Ok(entity);
        }
        match ResultConverter::Entity(kind).convert(&outcome, self)? {
            ResolvedValue::Entity(resolved) => Ok(Entity::from_resolved(kind, resolved)),
            other => Err(RestError::ProtocolMismatch(format!(
                "expected a {}, got {}",
                kind,
                other.kind_name()
            ))),
        }
    }

    fn collection_result<T: EntityHandle>(
        &self,
        outcome: Outcome,
        converter: ResultConverter,
    ) -> RestResult<Deferred<Vec<T>>> {
        if let Some(batch_id) = outcome.batch_id() {
            let cell = Deferred::pending();
            self.bind(batch_id, Arc::new(cell.clone()), converter)?;
            return Ok(cell);
        }
        match converter.convert(&outcome, self)? {
            ResolvedValue::Entities(entities) => Ok(Deferred::ready(
                entities.into_iter().map(T::from_entity).collect(),
            )),
            other => Err(RestError::ProtocolMismatch(format!(
                "expected an entity list, got {}",
                other.kind_name()
            ))),
        }
    }

    async fn get_entity_by_id(&self, kind: EntityKind, id: u64) -> RestResult<Entity> {
        let outcome = self.direct.get(&format!("{}/{}", kind.type_name(), id)).await?;
        if outcome.status_is(StatusCode::NOT_FOUND) {
            return Err(RestError::NotFound(format!("{} {}", kind, id)));
        }
        expect_success(&outcome, &format!("get {} {}", kind, id))?;
        Entity::from_representation(kind, outcome.to_map()?, &self.executing())
    }

    pub async fn get_node_by_id(&self, id: u64) -> RestResult<Node> {
        self.get_entity_by_id(EntityKind::Node, id).await.map(Node::from_entity)
    }

    pub async fn get_relationship_by_id(&self, id: u64) -> RestResult<Relationship> {
        self.get_entity_by_id(EntityKind::Relationship, id)
            .await
            .map(Relationship::from_entity)
    }

    /// The node advertised as `reference_node` by the service root
    pub async fn reference_node(&self) -> RestResult<Node> {
        let outcome = self.direct.get("").await?;
        expect_success(&outcome, "service root")?;
        match outcome.to_map()?.get("reference_node") {
            Some(Value::String(uri)) => {
                let entity = Entity::from_uri(EntityKind::Node, uri.clone(), &self.executing());
                Ok(Node::from_entity(entity))
            }
            _ => Err(RestError::NotFound("reference node".to_string())),
        }
    }

    pub async fn create_node(&self, properties: Option<PropertyMap>) -> RestResult<Node> {
        let body = properties
            .map(|p| properties_to_json(&p))
            .unwrap_or_else(|| json!({}));
        let outcome = self.request.post("node", body).await?;
        self.entity_result(EntityKind::Node, outcome).map(Node::from_entity)
    }

    pub async fn create_relationship(
        &self,
        start: &Node,
        end: &Node,
        rel_type: RelationshipType,
        properties: Option<PropertyMap>,
    ) -> RestResult<Relationship> {
        let start_ref = self.target_reference(start)?;
        let mut data = json!({
            "to": self.target_reference(end)?,
            "type": rel_type.name(),
        });
        if let Some(properties) = properties.filter(|p| !p.is_empty()) {
            data["data"] = properties_to_json(&properties);
        }
        let outcome = self.request.with(&start_ref).post("relationships", data).await?;
        self.entity_result(EntityKind::Relationship, outcome)
            .map(Relationship::from_entity)
    }

    pub async fn delete_entity(&self, entity: &Entity) -> RestResult<()> {
        let target = self.target_reference(entity)?;
        let outcome = self.request.with(&target).delete("").await?;
        expect_success(&outcome, &format!("delete {}", target))
    }

    /// Write one property. Directly the cached data is invalidated;
    /// inside a batch the entity refetches once the batch has run.
    pub async fn set_property_on_entity(&self, entity: &Entity, key: &str, value: PropertyValue) -> RestResult<()> {
        if key.is_empty() {
            return Err(RestError::InvalidArgument("property key must not be empty".to_string()));
        }
        let target = self.target_reference(entity)?;
        let path = format!("properties/{}", encode_segment(key));
        let outcome = self.request.with(&target).put(&path, value.to_json()).await?;
        match outcome.batch_id() {
            Some(batch_id) => self.bind(batch_id, Arc::new(entity.clone()), ResultConverter::PropertyRefresher),
            None => {
                expect_success(&outcome, &format!("set '{}' on {}", key, target))?;
                entity.invalidate();
                Ok(())
            }
        }
    }

    pub async fn remove_property_from_entity(&self, entity: &Entity, key: &str) -> RestResult<()> {
        let target = self.target_reference(entity)?;
        let path = format!("properties/{}", encode_segment(key));
        let outcome = self.request.with(&target).delete(&path).await?;
        match outcome.batch_id() {
            Some(batch_id) => self.bind(batch_id, Arc::new(entity.clone()), ResultConverter::PropertyRefresher),
            None => {
                entity.invalidate();
                if outcome.status_is(StatusCode::NOT_FOUND) {
                    return Err(RestError::NotFound(format!("'{}' on {}", key, target)));
                }
                expect_success(&outcome, &format!("remove '{}' from {}", key, target))
            }
        }
    }

    /// Fetch the property map of a resolved entity; anything but 200
    /// yields an empty map
    pub async fn properties_of(&self, entity: &Entity) -> RestResult<Map<String, Value>> {
        let uri = entity.require_uri()?;
        let outcome = self.direct.rebased(&uri).get("properties").await?;
        if !outcome.status_is(StatusCode::OK) {
            return Ok(Map::new());
        }
        match outcome.to_value()? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(RestError::ProtocolMismatch(format!(
                "properties of {} must be an object, got {}",
                uri,
                json_kind(&other)
            ))),
        }
    }

    pub(crate) async fn structural_data_of(&self, uri: &str) -> RestResult<Map<String, Value>> {
        let outcome = self.direct.rebased(uri).get("").await?;
        expect_success(&outcome, uri)?;
        outcome.to_map()
    }

    /// Relationships of a node, optionally restricted to some types
    pub async fn relationships(
        &self,
        node: &Node,
        direction: Direction,
        types: &[RelationshipType],
    ) -> RestResult<Deferred<Vec<Relationship>>> {
        let target = self.target_reference(node)?;
        let mut path = format!("relationships/{}", direction.path_segment());
        if !types.is_empty() {
            let names: Vec<String> = types.iter().map(|t| encode_segment(t.name())).collect();
            path.push('/');
            path.push_str(&names.join("&"));
        }
        let outcome = self.request.with(&target).get(&path).await?;
        self.collection_result(outcome, ResultConverter::RelationshipList)
    }

    pub fn index(&self) -> IndexManager {
        IndexManager::new(self.clone())
    }

    pub async fn query_index<T: EntityHandle>(&self, path: &str) -> RestResult<IndexHits<T>> {
        let outcome = self.request.get(path).await?;
        self.collection_result(outcome, ResultConverter::IndexHits(T::KIND))
            .map(IndexHits::new)
    }

    pub async fn add_to_index<T: EntityHandle>(
        &self,
        index: &Index<T>,
        entity: &T,
        key: &str,
        value: PropertyValue,
    ) -> RestResult<()> {
        let data = json!({
            "key": key,
            "value": value.to_json(),
            "uri": self.target_reference(entity.entity())?,
        });
        let outcome = self.request.post(&index.path(), data).await?;
        expect_success(
            &outcome,
            &format!("add {} {}={} to index {}", entity.entity(), key, value, index.name()),
        )
    }

    /// Remove index entries of an entity, narrowed by key and value.
    /// Not available inside a batch.
    pub async fn remove_from_index<T: EntityHandle>(
        &self,
        index: &Index<T>,
        entity: &T,
        key: Option<&str>,
        value: Option<&PropertyValue>,
    ) -> RestResult<()> {
        if self.is_recording() {
            return Err(RestError::Unsupported(
                "removing index entries inside a batch".to_string(),
            ));
        }
        let uri = entity.entity().require_uri()?;
        let id = entity_id(&uri)
            .ok_or_else(|| RestError::ProtocolMismatch(format!("no entity id in {}", uri)))?;
        let path = format!("{}/{}", index.path_for(key, value), id);
        let outcome = self.request.delete(&path).await?;
        expect_success(&outcome, &format!("remove {} from index {}", uri, index.name()))
    }

    pub async fn delete_index<T: EntityHandle>(&self, index: &Index<T>) -> RestResult<()> {
        let outcome = self.request.delete(&index.path()).await?;
        expect_success(&outcome, &format!("delete index {}", index.name()))
    }

    /// Index `entity` unless key/value is taken; returns the indexed entity
    pub async fn put_if_absent<T: EntityHandle>(
        &self,
        index: &Index<T>,
        entity: &T,
        key: &str,
        value: PropertyValue,
    ) -> RestResult<T> {
        let data = json!({
            "key": key,
            "value": value.to_json(),
            "uri": self.target_reference(entity.entity())?,
        });
        let outcome = self.request.post(&index.unique_path(), data).await?;
        self.entity_result(T::KIND, outcome).map(T::from_entity)
    }

    pub async fn get_or_create_node(
        &self,
        index: &Index<Node>,
        key: &str,
        value: PropertyValue,
        properties: Option<PropertyMap>,
    ) -> RestResult<Node> {
        if key.is_empty() {
            return Err(RestError::InvalidArgument(format!(
                "unique index {} needs a key",
                index.name()
            )));
        }
        let data = json!({
            "key": key,
            "value": value.to_json(),
            "properties": properties.map(|p| properties_to_json(&p)).unwrap_or_else(|| json!({})),
        });
        let outcome = self.request.post(&index.unique_path(), data).await?;
        self.entity_result(EntityKind::Node, outcome).map(Node::from_entity)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn get_or_create_relationship(
        &self,
        index: &Index<Relationship>,
        key: &str,
        value: PropertyValue,
        start: &Node,
        end: &Node,
        rel_type: RelationshipType,
        properties: Option<PropertyMap>,
    ) -> RestResult<Relationship> {
        if key.is_empty() {
            return Err(RestError::InvalidArgument(format!(
                "unique index {} needs a key",
                index.name()
            )));
        }
        let data = json!({
            "key": key,
            "value": value.to_json(),
            "properties": properties.map(|p| properties_to_json(&p)).unwrap_or_else(|| json!({})),
            "start": self.target_reference(start)?,
            "end": self.target_reference(end)?,
            "type": rel_type.name(),
        });
        let outcome = self.request.post(&index.unique_path(), data).await?;
        self.entity_result(EntityKind::Relationship, outcome)
            .map(Relationship::from_entity)
    }

    /// Existing indexes of one kind. While recording every index is
    /// reported as existing.
    pub async fn index_info(&self, kind: EntityKind) -> RestResult<IndexInfo> {
        if self.is_recording() {
            return Ok(IndexInfo::permissive());
        }
        let outcome = self.direct.get(&format!("index/{}", kind.type_name())).await?;
        if outcome.status_is(StatusCode::NO_CONTENT) || outcome.status_is(StatusCode::NOT_FOUND) {
            return Ok(IndexInfo::default());
        }
        expect_success(&outcome, &format!("{} index listing", kind))?;
        IndexInfo::from_value(&outcome.to_value()?)
    }

    pub async fn create_index(&self, kind: EntityKind, name: &str, config: &IndexConfig) -> RestResult<()> {
        let data = json!({"name": name, "config": config});
        let outcome = self.request.post(&format!("index/{}", kind.type_name()), data).await?;
        expect_success(&outcome, &format!("create {} index {}", kind, name))
    }

    /// Run a traversal from `node` and return the matching paths
    pub async fn traverse(&self, node: &Node, description: &TraversalDescription) -> RestResult<Vec<Path>> {
        let uri = node.require_uri()?;
        let body = description.to_json();
        let outcome = self
            .direct
            .rebased(&uri)
            .post(&format!("traverse/{}", FULLPATH), body.clone())
            .await?;
        if !outcome.status_is(StatusCode::OK) {
            return Err(RestError::UnexpectedStatus {
                status: outcome.status(),
                context: format!("traversal {}", body),
            });
        }
        let api = self.executing();
        match outcome.to_value()? {
            Value::Array(items) => items.iter().map(|item| Path::from_value(item, &api)).collect(),
            other => Err(RestError::ProtocolMismatch(format!(
                "traversal result must be an array, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub async fn cypher(&self, statement: &str, params: Option<Map<String, Value>>) -> RestResult<RecordBatch> {
        CypherEngine::new(self.executing()).query(statement, params).await
    }

    pub async fn gremlin(&self, script: &str, params: Option<Map<String, Value>>) -> RestResult<GremlinResult> {
        GremlinEngine::new(self.executing()).query(script, params).await
    }

    /// Start recording a batch; fails on a facade that already records
    pub fn begin_batch(&self) -> RestResult<BatchCoordinator> {
        BatchCoordinator::begin(self)
    }

    /// Record the operations `work` performs on the batch facade, send
    /// them in one request and resolve every placeholder.
    ///
    /// Entries whose result could not be applied are reported as
    /// [`RestError::PartialBatch`] after the others have been patched.
    pub async fn execute_batch<F, Fut, T>(&self, work: F) -> RestResult<T>
    where
        F: FnOnce(RestApi) -> Fut,
        Fut: Future<Output = RestResult<T>>,
    {
        let coordinator = self.begin_batch()?;
        let value = work(coordinator.api().clone()).await?;
        coordinator.execute().await?.into_result()?;
        Ok(value)
    }
}
