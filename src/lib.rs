//! restgraph
//!
//! Client for graph databases exposing the classic REST API: nodes,
//! relationships, legacy indexes, traversals and the Cypher/Gremlin
//! plugins, presented as local objects.
//!
//! # Architecture
//!
//! - [`transport`]: one HTTP exchange (verb, absolute URI, JSON body)
//! - [`request`]: strategies issuing requests now or recording them
//! - [`batch`]: ledger, wire format and coordinator for `POST batch`
//! - [`converter`]: turns outcomes into entities or entity lists
//! - [`entity`]: shared entity handles with a property cache
//! - [`api`]: the [`RestApi`] facade
//! - [`index`], [`traversal`], [`query`]: thin wrappers over the
//!   corresponding endpoints
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use restgraph::{ClientConfig, PropertyMap, PropertyValue, RestApi, RestError};
//!
//! # async fn demo() -> restgraph::RestResult<()> {
//! let api = RestApi::new(&ClientConfig::new("http://localhost:7474/db/data"))?;
//!
//! // Two nodes and a relationship in one round trip
//! let (alice, knows) = api
//!     .execute_batch(|batch| async move {
//!         let mut props = PropertyMap::new();
//!         props.insert("name".to_string(), "Alice".into());
//!         let alice = batch.create_node(Some(props)).await?;
//!         let bob = batch.create_node(None).await?;
//!         let knows = alice.create_relationship_to(&bob, "KNOWS", None).await?;
//!         Ok::<_, RestError>((alice, knows))
//!     })
//!     .await?;
//!
//! assert_eq!(alice.get_property("name").await?, PropertyValue::from("Alice"));
//! assert!(knows.is_type(&"KNOWS".into()).await?);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod batch;
pub mod config;
pub mod converter;
pub mod entity;
pub mod error;
pub mod index;
pub mod outcome;
pub mod query;
pub mod request;
pub mod transport;
pub mod traversal;
pub mod types;

// Re-export main types for convenience
pub use api::RestApi;

pub use batch::{BatchCoordinator, BatchJob, BatchJobResult, BatchReport, Deferred, OperationLedger};

pub use config::{ClientConfig, DEFAULT_BASE_URI};

pub use converter::{ResolvedValue, ResultConverter, UpdatableResult};

pub use entity::{Entity, EntityHandle, Node, PropertyMap, PropertyValue, Relationship};

pub use error::{RestError, RestResult};

pub use index::{Index, IndexConfig, IndexHits, IndexInfo, IndexManager};

pub use outcome::Outcome;

pub use query::{CypherEngine, GremlinEngine, GremlinResult, Record, RecordBatch, ResultValue};

pub use request::{ExecutingRequest, RecordingRequest, RestRequest};

pub use transport::{HttpTransport, Method, Transport, TransportResponse};

pub use traversal::{Path, PruneEvaluator, ReturnFilter, ScriptLanguage, TraversalDescription, Uniqueness};

pub use types::{Direction, EntityKind, RelationshipType};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
