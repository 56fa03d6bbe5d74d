//! Index administration

use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::RestApi;
use crate::entity::{EntityHandle, Node, Relationship};
use crate::error::{RestError, RestResult};
use crate::outcome::json_kind;
use crate::types::EntityKind;

use super::Index;

/// Provider configuration of an index (`type`, `provider`, ...)
pub type IndexConfig = BTreeMap<String, String>;

/// Configuration used when an index is created implicitly
pub fn exact_config() -> IndexConfig {
    let mut config = IndexConfig::new();
    config.insert("provider".to_string(), "lucene".to_string());
    config.insert("type".to_string(), "exact".to_string());
    config
}

/// Names and configurations of the indexes of one entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexInfo {
    indexes: BTreeMap<String, IndexConfig>,
    permissive: bool,
}

impl IndexInfo {
    /// Parse `GET index/<type>`: an object of name → configuration, or
    /// nothing at all when no index exists
    pub fn from_value(value: &Value) -> RestResult<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(RestError::ProtocolMismatch(format!(
                    "index listing must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut indexes = BTreeMap::new();
        for (name, config) in map {
            let config = match config {
                Value::Object(entries) => entries
                    .iter()
                    .map(|(k, v)| {
                        let text = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), text)
                    })
                    .collect(),
                _ => IndexConfig::new(),
            };
            indexes.insert(name.clone(), config);
        }
        Ok(Self {
            indexes,
            permissive: false,
        })
    }

    /// Stand-in used while recording a batch: every index is assumed to
    /// exist so that no creation request is recorded
    pub(crate) fn permissive() -> Self {
        Self {
            indexes: BTreeMap::new(),
            permissive: true,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.permissive || self.indexes.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn config(&self, name: &str) -> Option<&IndexConfig> {
        self.indexes.get(name)
    }

    /// Whether the index exists; an existing index whose configuration
    /// contradicts `config` is an error
    pub fn check_config(&self, name: &str, config: Option<&IndexConfig>) -> RestResult<bool> {
        if self.permissive {
            return Ok(true);
        }
        let existing = match self.indexes.get(name) {
            Some(existing) => existing,
            None => return Ok(false),
        };
        if let Some(config) = config {
            for (key, value) in config {
                if let Some(current) = existing.get(key) {
                    if current != value {
                        return Err(RestError::InvalidArgument(format!(
                            "index '{}' exists with {}={}, requested {}",
                            name, key, current, value
                        )));
                    }
                }
            }
        }
        Ok(true)
    }
}

/// Entry point for index administration
#[derive(Debug, Clone)]
pub struct IndexManager {
    api: RestApi,
}

impl IndexManager {
    pub(crate) fn new(api: RestApi) -> Self {
        Self { api }
    }

    pub async fn exists_for_nodes(&self, name: &str) -> RestResult<bool> {
        Ok(self.api.index_info(EntityKind::Node).await?.exists(name))
    }

    pub async fn exists_for_relationships(&self, name: &str) -> RestResult<bool> {
        Ok(self.api.index_info(EntityKind::Relationship).await?.exists(name))
    }

    /// Node index, created with the exact configuration when missing
    pub async fn for_nodes(&self, name: &str) -> RestResult<Index<Node>> {
        self.open(name, None).await
    }

    pub async fn for_nodes_with_config(&self, name: &str, config: IndexConfig) -> RestResult<Index<Node>> {
        self.open(name, Some(config)).await
    }

    pub async fn for_relationships(&self, name: &str) -> RestResult<Index<Relationship>> {
        self.open(name, None).await
    }

    pub async fn for_relationships_with_config(
        &self,
        name: &str,
        config: IndexConfig,
    ) -> RestResult<Index<Relationship>> {
        self.open(name, Some(config)).await
    }

    pub async fn node_index_names(&self) -> RestResult<Vec<String>> {
        Ok(self.api.index_info(EntityKind::Node).await?.names())
    }

    pub async fn relationship_index_names(&self) -> RestResult<Vec<String>> {
        Ok(self.api.index_info(EntityKind::Relationship).await?.names())
    }

    pub async fn configuration<T: EntityHandle>(&self, index: &Index<T>) -> RestResult<Option<IndexConfig>> {
        Ok(self.api.index_info(T::KIND).await?.config(index.name()).cloned())
    }

    async fn open<T: EntityHandle>(&self, name: &str, config: Option<IndexConfig>) -> RestResult<Index<T>> {
        if matches!(&config, Some(config) if config.is_empty()) {
            return Err(RestError::InvalidArgument(
                "no index configuration was provided".to_string(),
            ));
        }
        let info = self.api.index_info(T::KIND).await?;
        if !info.check_config(name, config.as_ref())? {
            let config = config.unwrap_or_else(exact_config);
            self.api.create_index(T::KIND, name, &config).await?;
        }
        Ok(Index::new(name, self.api.clone()))
    }
}
