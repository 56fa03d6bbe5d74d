//! In-memory REST graph server used by the integration tests
//!
//! Implements the node, relationship, property, index and batch
//! endpoints closely enough for the client to run unmodified. Requests
//! are logged so tests can count round trips.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use restgraph::types::entity_id;
use restgraph::{Method, RestApi, RestResult, Transport, TransportResponse};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const BASE: &str = "http://localhost:7474/db/data";

pub fn node_uri(id: u64) -> String {
    format!("{}/node/{}", BASE, id)
}

pub fn relationship_uri(id: u64) -> String {
    format!("{}/relationship/{}", BASE, id)
}

#[derive(Debug, Clone)]
struct Rel {
    start: u64,
    end: u64,
    rel_type: String,
    data: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct IndexState {
    config: Map<String, Value>,
    /// (key, value text, entity id)
    entries: Vec<(String, String, u64)>,
}

#[derive(Debug, Clone)]
struct Graph {
    next_node: u64,
    next_rel: u64,
    nodes: BTreeMap<u64, Map<String, Value>>,
    rels: BTreeMap<u64, Rel>,
    /// keyed by (node|relationship, name)
    indexes: BTreeMap<(String, String), IndexState>,
}

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    location: Option<String>,
    body: Option<Value>,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self { status: 200, location: None, body: Some(body) }
    }

    fn created(location: String, body: Value) -> Self {
        Self { status: 201, location: Some(location), body: Some(body) }
    }

    fn no_content() -> Self {
        Self { status: 204, location: None, body: None }
    }

    fn error(status: u16, exception: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            location: None,
            body: Some(json!({"message": message.into(), "exception": exception})),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::error(404, "NotFoundException", message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::error(400, "BadInputException", message)
    }

    fn message(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("failed")
            .to_string()
    }

    fn into_response(self) -> TransportResponse {
        TransportResponse::new(self.status, self.location, self.body.map(|b| b.to_string()))
    }
}

struct Injected {
    method: Method,
    suffix: String,
    reply: Reply,
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_uri(kind: &str, id: u64) -> String {
    format!("{}/{}/{}", BASE, kind, id)
}

fn relative(uri: &str) -> String {
    uri.strip_prefix(BASE)
        .map(|p| p.trim_start_matches('/').to_string())
        .unwrap_or_else(|| uri.to_string())
}

fn substitute(text: &str, locations: &BTreeMap<u64, String>) -> String {
    let mut out = text.to_string();
    for (id, location) in locations {
        out = out.replace(&format!("{{{}}}", id), location);
    }
    out
}

fn substitute_value(value: &Value, locations: &BTreeMap<u64, String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, locations)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, locations)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, locations)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn pattern_matches(pattern: &str, text: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => text.starts_with(prefix),
        None => pattern == text,
    }
}

impl Graph {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        // reference node
        nodes.insert(0, Map::new());
        Self {
            next_node: 1,
            next_rel: 1,
            nodes,
            rels: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    fn node_json(&self, id: u64) -> Value {
        let uri = node_uri(id);
        json!({
            "self": uri,
            "data": self.nodes.get(&id).cloned().unwrap_or_default(),
            "properties": format!("{}/properties", uri),
            "property": format!("{}/properties/{{key}}", uri),
            "create_relationship": format!("{}/relationships", uri),
            "all_relationships": format!("{}/relationships/all", uri),
            "traverse": format!("{}/traverse/{{returnType}}", uri),
        })
    }

    fn rel_json(&self, id: u64) -> Value {
        match self.rels.get(&id) {
            Some(rel) => {
                let uri = relationship_uri(id);
                json!({
                    "self": uri,
                    "start": node_uri(rel.start),
                    "end": node_uri(rel.end),
                    "type": rel.rel_type,
                    "data": rel.data,
                    "properties": format!("{}/properties", uri),
                })
            }
            None => Value::Null,
        }
    }

    fn entity_json(&self, kind: &str, id: u64) -> Value {
        if kind == "node" {
            self.node_json(id)
        } else {
            self.rel_json(id)
        }
    }

    fn exists(&self, kind: &str, id: u64) -> bool {
        match kind {
            "node" => self.nodes.contains_key(&id),
            "relationship" => self.rels.contains_key(&id),
            _ => false,
        }
    }

    fn properties_mut(&mut self, kind: &str, id: u64) -> Option<&mut Map<String, Value>> {
        match kind {
            "node" => self.nodes.get_mut(&id),
            "relationship" => self.rels.get_mut(&id).map(|rel| &mut rel.data),
            _ => None,
        }
    }

    fn properties(&self, kind: &str, id: u64) -> Option<&Map<String, Value>> {
        match kind {
            "node" => self.nodes.get(&id),
            "relationship" => self.rels.get(&id).map(|rel| &rel.data),
            _ => None,
        }
    }

    fn handle(&mut self, method: Method, path: &str, body: Option<&Value>) -> Reply {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        let segments: Vec<&str> = if path.is_empty() { Vec::new() } else { path.split('/').collect() };

        match (method, segments.as_slice()) {
            (Method::Get, []) => Reply::ok(json!({
                "node": format!("{}/node", BASE),
                "reference_node": node_uri(0),
                "node_index": format!("{}/index/node", BASE),
                "relationship_index": format!("{}/index/relationship", BASE),
                "batch": format!("{}/batch", BASE),
            })),
            (Method::Post, ["node"]) => self.create_node(body),
            (_, [kind @ ("node" | "relationship"), id, rest @ ..]) => match id.parse::<u64>() {
                Ok(id) if self.exists(kind, id) => self.entity_route(method, kind, id, rest, body),
                _ => Reply::not_found(format!("{} {} not found", kind, id)),
            },
            (Method::Get, ["index", kind]) => self.index_listing(kind),
            (Method::Post, ["index", kind]) => self.create_index(kind, body),
            (_, ["index", kind, name, rest @ ..]) => {
                let name = decode(name);
                self.index_route(method, kind, &name, rest, query, body)
            }
            _ => Reply::not_found(format!("no route for {} {}", method, path)),
        }
    }

    fn create_node(&mut self, body: Option<&Value>) -> Reply {
        let data = match body {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => return Reply::bad_request(format!("node properties must be a map, got {}", other)),
        };
        if data.values().any(|v| v.is_null() || v.is_object()) {
            return Reply::bad_request("property values must be primitives or arrays");
        }
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(id, data);
        Reply::created(node_uri(id), self.node_json(id))
    }

    fn entity_route(&mut self, method: Method, kind: &str, id: u64, rest: &[&str], body: Option<&Value>) -> Reply {
        match (method, rest) {
            (Method::Get, []) => Reply::ok(self.entity_json(kind, id)),
            (Method::Delete, []) => self.delete_entity(kind, id),
            (Method::Get, ["properties"]) => match self.properties(kind, id) {
                Some(props) if !props.is_empty() => Reply::ok(Value::Object(props.clone())),
                _ => Reply::no_content(),
            },
            (Method::Put, ["properties"]) => match body {
                Some(Value::Object(map)) => {
                    if let Some(props) = self.properties_mut(kind, id) {
                        *props = map.clone();
                    }
                    Reply::no_content()
                }
                _ => Reply::bad_request("properties must be a map"),
            },
            (Method::Delete, ["properties"]) => {
                if let Some(props) = self.properties_mut(kind, id) {
                    props.clear();
                }
                Reply::no_content()
            }
            (Method::Get, ["properties", key]) => {
                let key = decode(key);
                match self.properties(kind, id).and_then(|p| p.get(&key)) {
                    Some(value) => Reply::ok(value.clone()),
                    None => Reply::not_found(format!("no property '{}'", key)),
                }
            }
            (Method::Put, ["properties", key]) => {
                let key = decode(key);
                match body {
                    Some(value) if !value.is_null() && !value.is_object() => {
                        if let Some(props) = self.properties_mut(kind, id) {
                            props.insert(key, value.clone());
                        }
                        Reply::no_content()
                    }
                    _ => Reply::bad_request(format!("invalid value for '{}'", key)),
                }
            }
            (Method::Delete, ["properties", key]) => {
                let key = decode(key);
                match self.properties_mut(kind, id).and_then(|p| p.remove(&key)) {
                    Some(_) => Reply::no_content(),
                    None => Reply::not_found(format!("no property '{}'", key)),
                }
            }
            (Method::Post, ["relationships"]) if kind == "node" => self.create_relationship(id, body),
            (Method::Get, ["relationships", direction]) if kind == "node" => self.list_relationships(id, direction, None),
            (Method::Get, ["relationships", direction, types]) if kind == "node" => {
                let types: Vec<String> = types.split('&').map(decode).collect();
                self.list_relationships(id, direction, Some(&types))
            }
            _ => Reply::not_found(format!("no route for {} {}/{}/{}", method, kind, id, rest.join("/"))),
        }
    }

    fn delete_entity(&mut self, kind: &str, id: u64) -> Reply {
        if kind == "node" {
            if id == 0 {
                return Reply::error(409, "OperationFailureException", "cannot delete the reference node");
            }
            if self.rels.values().any(|rel| rel.start == id || rel.end == id) {
                return Reply::error(409, "OperationFailureException", format!("node {} still has relationships", id));
            }
            self.nodes.remove(&id);
        } else {
            self.rels.remove(&id);
        }
        for ((index_kind, _), index) in self.indexes.iter_mut() {
            if index_kind == kind {
                index.entries.retain(|(_, _, entry)| *entry != id);
            }
        }
        Reply::no_content()
    }

    fn node_id(&self, uri: Option<&Value>) -> Option<u64> {
        let uri = uri?.as_str()?;
        if !uri.starts_with(&format!("{}/node/", BASE)) {
            return None;
        }
        entity_id(uri).filter(|id| self.nodes.contains_key(id))
    }

    fn insert_relationship(&mut self, start: u64, end: u64, rel_type: &str, data: Map<String, Value>) -> u64 {
        let id = self.next_rel;
        self.next_rel += 1;
        self.rels.insert(
            id,
            Rel {
                start,
                end,
                rel_type: rel_type.to_string(),
                data,
            },
        );
        id
    }

    fn create_relationship(&mut self, start: u64, body: Option<&Value>) -> Reply {
        let body = match body {
            Some(Value::Object(map)) => map,
            _ => return Reply::bad_request("relationship body must be a map"),
        };
        let end = match self.node_id(body.get("to")) {
            Some(end) => end,
            None => return Reply::bad_request(format!("invalid end node {:?}", body.get("to"))),
        };
        let rel_type = match body.get("type").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Reply::bad_request("relationship type is required"),
        };
        let data = match body.get("data") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let id = self.insert_relationship(start, end, &rel_type, data);
        Reply::created(relationship_uri(id), self.rel_json(id))
    }

    fn list_relationships(&self, node: u64, direction: &str, types: Option<&[String]>) -> Reply {
        let rels: Vec<Value> = self
            .rels
            .iter()
            .filter(|(_, rel)| match direction {
                "out" => rel.start == node,
                "in" => rel.end == node,
                _ => rel.start == node || rel.end == node,
            })
            .filter(|(_, rel)| types.map_or(true, |types| types.contains(&rel.rel_type)))
            .map(|(id, _)| self.rel_json(*id))
            .collect();
        Reply::ok(Value::Array(rels))
    }

    fn index_listing(&self, kind: &str) -> Reply {
        let listing: Map<String, Value> = self
            .indexes
            .iter()
            .filter(|((index_kind, _), _)| index_kind == kind)
            .map(|((_, name), index)| (name.clone(), Value::Object(index.config.clone())))
            .collect();
        if listing.is_empty() {
            Reply::no_content()
        } else {
            Reply::ok(Value::Object(listing))
        }
    }

    fn ensure_index(&mut self, kind: &str, name: &str, config: Option<&Map<String, Value>>) -> &mut IndexState {
        self.indexes
            .entry((kind.to_string(), name.to_string()))
            .or_insert_with(|| IndexState {
                config: config.cloned().unwrap_or_else(|| {
                    let mut config = Map::new();
                    config.insert("provider".to_string(), json!("lucene"));
                    config.insert("type".to_string(), json!("exact"));
                    config
                }),
                entries: Vec::new(),
            })
    }

    fn create_index(&mut self, kind: &str, body: Option<&Value>) -> Reply {
        let name = match body.and_then(|b| b.get("name")).and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => return Reply::bad_request("index name is required"),
        };
        let config = body.and_then(|b| b.get("config")).and_then(Value::as_object).cloned();
        let index = self.ensure_index(kind, &name, config.as_ref());
        let mut template = index.config.clone();
        template.insert(
            "template".to_string(),
            json!(format!("{}/index/{}/{}/{{key}}/{{value}}", BASE, kind, name)),
        );
        Reply::created(format!("{}/index/{}/{}", BASE, kind, name), Value::Object(template))
    }

    fn hit_json(&self, kind: &str, key: &str, value: &str, id: u64) -> Value {
        let mut entity = self.entity_json(kind, id);
        entity["indexed"] = json!(format!("{}/index/{}/{}/{}", BASE, kind, key, value));
        entity
    }

    fn index_route(
        &mut self,
        method: Method,
        kind: &str,
        name: &str,
        rest: &[&str],
        query: Option<&str>,
        body: Option<&Value>,
    ) -> Reply {
        let key = (kind.to_string(), name.to_string());
        match (method, rest, query) {
            (Method::Post, [], Some("unique")) => self.unique_add(kind, name, body),
            (Method::Post, [], None) => self.index_add(kind, name, body),
            (Method::Delete, [], None) => match self.indexes.remove(&key) {
                Some(_) => Reply::no_content(),
                None => Reply::not_found(format!("no index {}", name)),
            },
            (Method::Get, [entry_key, entry_value], None) => {
                let (entry_key, entry_value) = (decode(entry_key), decode(entry_value));
                self.index_hits(kind, name, |k, v| k == entry_key && v == entry_value)
            }
            (Method::Get, rest, Some(query)) if rest.len() <= 1 => {
                let query = match query.strip_prefix("query=") {
                    Some(q) => decode(q),
                    None => return Reply::bad_request(format!("bad query {}", query)),
                };
                match rest.first() {
                    Some(entry_key) => {
                        let entry_key = decode(entry_key);
                        self.index_hits(kind, name, |k, v| k == entry_key && pattern_matches(&query, v))
                    }
                    None => match query.split_once(':') {
                        Some((qk, qv)) => {
                            let (qk, qv) = (qk.to_string(), qv.to_string());
                            self.index_hits(kind, name, |k, v| k == qk && pattern_matches(&qv, v))
                        }
                        None => Reply::bad_request(format!("query needs key:value, got {}", query)),
                    },
                }
            }
            (Method::Delete, rest, None) if !rest.is_empty() && rest.len() <= 3 => {
                let id = match rest.last().and_then(|id| id.parse::<u64>().ok()) {
                    Some(id) => id,
                    None => return Reply::bad_request("entity id expected"),
                };
                // [id], [key, id] or [key, value, id]
                let filter_key = if rest.len() >= 2 { Some(decode(rest[0])) } else { None };
                let filter_value = if rest.len() == 3 { Some(decode(rest[1])) } else { None };
                match self.indexes.get_mut(&key) {
                    Some(index) => {
                        index.entries.retain(|(k, v, entry)| {
                            !(*entry == id
                                && filter_key.as_ref().map_or(true, |fk| fk == k)
                                && filter_value.as_ref().map_or(true, |fv| fv == v))
                        });
                        Reply::no_content()
                    }
                    None => Reply::not_found(format!("no index {}", name)),
                }
            }
            _ => Reply::not_found(format!("no index route {} {}", method, rest.join("/"))),
        }
    }

    fn index_hits(&self, kind: &str, name: &str, matches: impl Fn(&str, &str) -> bool) -> Reply {
        let index = match self.indexes.get(&(kind.to_string(), name.to_string())) {
            Some(index) => index,
            None => return Reply::not_found(format!("no index {}", name)),
        };
        let hits: Vec<Value> = index
            .entries
            .iter()
            .filter(|(k, v, _)| matches(k, v))
            .map(|(k, v, id)| self.hit_json(kind, k, v, *id))
            .collect();
        Reply::ok(Value::Array(hits))
    }

    fn entry_parts(body: Option<&Value>) -> Result<(String, String, &Map<String, Value>), Reply> {
        let body = match body {
            Some(Value::Object(map)) => map,
            _ => return Err(Reply::bad_request("index entry must be a map")),
        };
        let key = match body.get("key").and_then(Value::as_str) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(Reply::bad_request("index key is required")),
        };
        let value = match body.get("value") {
            Some(value) if !value.is_null() => value_text(value),
            _ => return Err(Reply::bad_request("index value is required")),
        };
        Ok((key, value, body))
    }

    fn entity_for_uri(&self, kind: &str, uri: Option<&Value>) -> Option<u64> {
        let uri = uri?.as_str()?;
        if !uri.starts_with(&format!("{}/{}/", BASE, kind)) {
            return None;
        }
        entity_id(uri).filter(|id| self.exists(kind, *id))
    }

    fn index_add(&mut self, kind: &str, name: &str, body: Option<&Value>) -> Reply {
        let (key, value, body) = match Self::entry_parts(body) {
            Ok(parts) => parts,
            Err(reply) => return reply,
        };
        let id = match self.entity_for_uri(kind, body.get("uri")) {
            Some(id) => id,
            None => return Reply::bad_request(format!("invalid uri {:?}", body.get("uri"))),
        };
        let index = self.ensure_index(kind, name, None);
        if !index.entries.iter().any(|(k, v, e)| k == &key && v == &value && *e == id) {
            index.entries.push((key.clone(), value.clone(), id));
        }
        Reply::created(
            format!("{}/index/{}/{}/{}/{}/{}", BASE, kind, name, key, value, id),
            self.hit_json(kind, &key, &value, id),
        )
    }

    fn unique_add(&mut self, kind: &str, name: &str, body: Option<&Value>) -> Reply {
        let (key, value, body) = match Self::entry_parts(body) {
            Ok((key, value, body)) => (key, value, body.clone()),
            Err(reply) => return reply,
        };
        let existing = self
            .ensure_index(kind, name, None)
            .entries
            .iter()
            .find(|(k, v, _)| k == &key && v == &value)
            .map(|(_, _, id)| *id);
        if let Some(id) = existing {
            return Reply::ok(self.hit_json(kind, &key, &value, id));
        }

        let properties = body.get("properties").and_then(Value::as_object).cloned().unwrap_or_default();
        let id = if body.contains_key("uri") {
            match self.entity_for_uri(kind, body.get("uri")) {
                Some(id) => id,
                None => return Reply::bad_request(format!("invalid uri {:?}", body.get("uri"))),
            }
        } else if kind == "node" {
            let id = self.next_node;
            self.next_node += 1;
            self.nodes.insert(id, properties);
            id
        } else {
            let (start, end) = match (self.node_id(body.get("start")), self.node_id(body.get("end"))) {
                (Some(start), Some(end)) => (start, end),
                _ => return Reply::bad_request("start and end nodes are required"),
            };
            let rel_type = match body.get("type").and_then(Value::as_str) {
                Some(t) => t.to_string(),
                None => return Reply::bad_request("relationship type is required"),
            };
            self.insert_relationship(start, end, &rel_type, properties)
        };

        self.ensure_index(kind, name, None).entries.push((key.clone(), value.clone(), id));
        Reply::created(kind_uri(kind, id), self.hit_json(kind, &key, &value, id))
    }
}

/// Fake server state plus a request log and one-shot error injection
pub struct FakeServer {
    graph: Mutex<Graph>,
    log: Mutex<Vec<(Method, String)>>,
    injected: Mutex<Vec<Injected>>,
    last_batch: Mutex<Option<Value>>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            graph: Mutex::new(Graph::new()),
            log: Mutex::new(Vec::new()),
            injected: Mutex::new(Vec::new()),
            last_batch: Mutex::new(None),
        })
    }

    /// Facade talking to this server
    pub fn api(self: &Arc<Self>) -> RestApi {
        RestApi::with_transport(BASE, self.clone())
    }

    /// The next request (or batch job) matching method and URI suffix
    /// fails with `status` and a structured exception
    pub fn fail_next(&self, method: Method, suffix: &str, status: u16, message: &str) {
        self.injected.lock().push(Injected {
            method,
            suffix: suffix.to_string(),
            reply: Reply::error(status, "InjectedFailureException", message),
        });
    }

    fn take_injected(&self, method: Method, uri: &str) -> Option<Reply> {
        let mut injected = self.injected.lock();
        let position = injected
            .iter()
            .position(|i| i.method == method && uri.ends_with(&i.suffix))?;
        Some(injected.remove(position).reply)
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.log.lock().clone()
    }

    /// Logged HTTP requests with this method whose URI ends with `suffix`
    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|(m, uri)| *m == method && uri.ends_with(suffix))
            .count()
    }

    pub fn batch_requests(&self) -> usize {
        self.count(Method::Post, "/batch")
    }

    pub fn last_batch(&self) -> Option<Value> {
        self.last_batch.lock().clone()
    }

    /// Nodes other than the reference node
    pub fn node_count(&self) -> usize {
        self.graph.lock().nodes.len() - 1
    }

    pub fn relationship_count(&self) -> usize {
        self.graph.lock().rels.len()
    }

    pub fn node_properties(&self, id: u64) -> Option<Map<String, Value>> {
        self.graph.lock().nodes.get(&id).cloned()
    }

    /// Write a property behind the client's back
    pub fn set_node_property(&self, id: u64, key: &str, value: Value) {
        if let Some(props) = self.graph.lock().nodes.get_mut(&id) {
            props.insert(key.to_string(), value);
        }
    }

    fn batch(&self, body: Option<&Value>) -> Reply {
        let jobs = match body {
            Some(Value::Array(jobs)) => jobs.clone(),
            _ => return Reply::bad_request("batch body must be an array"),
        };
        *self.last_batch.lock() = Some(Value::Array(jobs.clone()));

        let mut graph = self.graph.lock();
        let snapshot = graph.clone();
        let mut locations = BTreeMap::new();
        let mut results = Vec::with_capacity(jobs.len());

        for job in &jobs {
            let id = job.get("id").and_then(Value::as_u64).unwrap_or_default();
            let method = match job.get("method").and_then(Value::as_str) {
                Some("GET") => Method::Get,
                Some("POST") => Method::Post,
                Some("PUT") => Method::Put,
                Some("DELETE") => Method::Delete,
                other => return Reply::bad_request(format!("job {} has bad method {:?}", id, other)),
            };
            let to = substitute(job.get("to").and_then(Value::as_str).unwrap_or_default(), &locations);
            let job_body = job.get("body").map(|b| substitute_value(b, &locations));
            let absolute = if to.starts_with("http") { to.clone() } else { format!("{}/{}", BASE, to) };

            let reply = match self.take_injected(method, &absolute) {
                Some(reply) => reply,
                None => graph.handle(method, &relative(&absolute), job_body.as_ref()),
            };
            if reply.status >= 400 {
                *graph = snapshot;
                return Reply::error(
                    500,
                    "BatchOperationFailedException",
                    format!("Job {} failed: {}", id, reply.message()),
                );
            }

            if let Some(location) = &reply.location {
                locations.insert(id, location.clone());
            }
            let mut entry = json!({"id": id, "from": to, "status": reply.status});
            if let Some(location) = reply.location {
                entry["location"] = json!(location);
            }
            if let Some(body) = reply.body {
                entry["body"] = body;
            }
            results.push(entry);
        }
        Reply::ok(Value::Array(results))
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn execute(&self, method: Method, uri: &str, body: Option<&Value>) -> RestResult<TransportResponse> {
        self.log.lock().push((method, uri.to_string()));
        if let Some(reply) = self.take_injected(method, uri) {
            return Ok(reply.into_response());
        }
        let path = relative(uri);
        let reply = if method == Method::Post && path == "batch" {
            self.batch(body)
        } else {
            self.graph.lock().handle(method, &path, body)
        };
        Ok(reply.into_response())
    }
}
