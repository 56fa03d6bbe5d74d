//! Legacy key/value indexes
//!
//! Indexes live under `index/<node|relationship>/<name>`. Entries are
//! addressed by `<key>/<value>` path segments, queries by `?query=`,
//! and unique (get-or-create) writes by `?unique`.

pub mod hits;
pub mod manager;

pub use hits::IndexHits;
pub use manager::{exact_config, IndexConfig, IndexInfo, IndexManager};

use std::fmt;
use std::marker::PhantomData;

use crate::api::RestApi;
use crate::entity::{EntityHandle, PropertyValue};
use crate::error::RestResult;
use crate::request::encode_segment;
use crate::types::EntityKind;

/// Path segment for an index value; strings are used verbatim, other
/// values by their JSON text
pub(crate) fn value_segment(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => encode_segment(s),
        other => encode_segment(&other.to_json().to_string()),
    }
}

/// A named index over nodes or relationships
pub struct Index<T> {
    name: String,
    api: RestApi,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            api: self.api.clone(),
            _kind: PhantomData,
        }
    }
}

impl<T: EntityHandle> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("kind", &T::KIND)
            .field("name", &self.name)
            .finish()
    }
}

impl<T: EntityHandle> Index<T> {
    pub(crate) fn new(name: impl Into<String>, api: RestApi) -> Self {
        Self {
            name: name.into(),
            api,
            _kind: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    /// `index/<type>/<name>`
    pub fn path(&self) -> String {
        format!("index/{}/{}", T::KIND.type_name(), encode_segment(&self.name))
    }

    /// Index path narrowed to a key and optionally a value
    pub fn path_for(&self, key: Option<&str>, value: Option<&PropertyValue>) -> String {
        let mut path = self.path();
        if let Some(key) = key {
            path.push('/');
            path.push_str(&encode_segment(key));
        }
        if let Some(value) = value {
            path.push('/');
            path.push_str(&value_segment(value));
        }
        path
    }

    pub fn unique_path(&self) -> String {
        format!("{}?unique", self.path())
    }

    fn query_path(&self, key: Option<&str>, query: &str) -> String {
        format!("{}?query={}", self.path_for(key, None), encode_segment(query))
    }

    pub async fn add(&self, entity: &T, key: &str, value: impl Into<PropertyValue>) -> RestResult<()> {
        self.api.add_to_index(self, entity, key, value.into()).await
    }

    /// Add unless an entry for key/value exists; returns the indexed entity
    pub async fn put_if_absent(&self, entity: &T, key: &str, value: impl Into<PropertyValue>) -> RestResult<T> {
        self.api.put_if_absent(self, entity, key, value.into()).await
    }

    /// Exact lookup
    pub async fn get(&self, key: &str, value: impl Into<PropertyValue>) -> RestResult<IndexHits<T>> {
        let value = value.into();
        self.api.query_index(&self.path_for(Some(key), Some(&value))).await
    }

    /// Query on one key using the index provider's query syntax
    pub async fn query(&self, key: &str, query: &str) -> RestResult<IndexHits<T>> {
        self.api.query_index(&self.query_path(Some(key), query)).await
    }

    /// Query across all keys
    pub async fn query_all(&self, query: &str) -> RestResult<IndexHits<T>> {
        self.api.query_index(&self.query_path(None, query)).await
    }

    /// Remove every entry for the entity
    pub async fn remove(&self, entity: &T) -> RestResult<()> {
        self.api.remove_from_index(self, entity, None, None).await
    }

    pub async fn remove_key(&self, entity: &T, key: &str) -> RestResult<()> {
        self.api.remove_from_index(self, entity, Some(key), None).await
    }

    pub async fn remove_value(&self, entity: &T, key: &str, value: impl Into<PropertyValue>) -> RestResult<()> {
        let value = value.into();
        self.api.remove_from_index(self, entity, Some(key), Some(&value)).await
    }

    /// Drop the whole index
    pub async fn delete(&self) -> RestResult<()> {
        self.api.delete_index(self).await
    }
}
