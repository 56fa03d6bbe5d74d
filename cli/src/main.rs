//! restgraph CLI: command-line access to a graph database REST server
//!
//! Uses the restgraph facade; `import` records every creation into a single
//! batch request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use restgraph::{
    ClientConfig, Entity, GremlinResult, Node, PropertyMap, PropertyValue, RecordBatch, RestApi, RestError,
    ResultValue,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

#[derive(Parser)]
#[command(name = "restgraph", version, about = "Graph database REST client")]
struct Cli {
    /// Server base URI, e.g. http://localhost:7474/db/data
    #[arg(long, global = true, env = "RESTGRAPH_URL")]
    url: Option<String>,

    /// YAML client configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a node and its properties
    Node { id: u64 },
    /// Show a relationship and its properties
    Relationship { id: u64 },
    /// Create a node
    CreateNode {
        /// Property as key=value; values are parsed as JSON when possible
        #[arg(short, long = "property")]
        properties: Vec<String>,
    },
    /// Execute a Cypher query
    Query {
        cypher: String,
        /// Parameter as key=value
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// Execute a Gremlin script
    Gremlin { script: String },
    /// List node and relationship indexes
    Indexes,
    /// Look up nodes in an index
    Lookup { index: String, key: String, value: String },
    /// Create the nodes and relationships of a YAML or JSON file in one batch
    Import { file: PathBuf },
}

#[derive(Debug, Deserialize)]
struct ImportPlan {
    #[serde(default)]
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    relationships: Vec<RelationshipEntry>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    key: String,
    #[serde(default)]
    properties: PropertyMap,
}

#[derive(Debug, Deserialize)]
struct RelationshipEntry {
    from: String,
    to: String,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: PropertyMap,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let api = connect(cli.url.as_deref(), cli.config.as_deref())?;
    match cli.command {
        Commands::Node { id } => {
            let node = api.get_node_by_id(id).await?;
            show_entity(&node, &cli.format).await
        }
        Commands::Relationship { id } => {
            let rel = api.get_relationship_by_id(id).await?;
            show_entity(&rel, &cli.format).await
        }
        Commands::CreateNode { properties } => {
            let properties = parse_properties(&properties)?;
            let node = api.create_node(Some(properties)).await?;
            show_entity(&node, &cli.format).await
        }
        Commands::Query { cypher, params } => {
            let params = parse_params(&params)?;
            let result = api.cypher(&cypher, Some(params)).await?;
            print_records(&result, &cli.format)
        }
        Commands::Gremlin { script } => match api.gremlin(&script, None).await? {
            GremlinResult::Table(batch) => print_records(&batch, &cli.format),
            GremlinResult::Values(values) => print_values(&values, &cli.format),
        },
        Commands::Indexes => run_indexes(&api, &cli.format).await,
        Commands::Lookup { index, key, value } => {
            let index = api.index().for_nodes(&index).await?;
            let hits = index.get(&key, parse_value(&value)).await?;
            let values: Vec<ResultValue> = hits.to_vec()?.into_iter().map(ResultValue::Node).collect();
            print_values(&values, &cli.format)
        }
        Commands::Import { file } => run_import(&api, &file).await,
    }
}

fn connect(url: Option<&str>, config: Option<&Path>) -> anyhow::Result<RestApi> {
    let mut config = match config {
        Some(path) => ClientConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ClientConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(url) = url {
        config.base_uri = url.trim_end_matches('/').to_string();
    }
    Ok(RestApi::new(&config)?)
}

fn parse_value(raw: &str) -> PropertyValue {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| PropertyValue::from_json("", &value).ok().flatten())
        .unwrap_or_else(|| PropertyValue::from(raw))
}

fn split_pair(pair: &str) -> anyhow::Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("expected key=value, got '{}'", pair),
    }
}

fn parse_properties(pairs: &[String]) -> anyhow::Result<PropertyMap> {
    let mut properties = PropertyMap::new();
    for pair in pairs {
        let (key, value) = split_pair(pair)?;
        properties.insert(key.to_string(), parse_value(value));
    }
    Ok(properties)
}

fn parse_params(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let (key, value) = split_pair(pair)?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

async fn show_entity(entity: &Entity, format: &OutputFormat) -> anyhow::Result<()> {
    let properties = entity.property_data().await?;
    match format {
        OutputFormat::Json => {
            let out = json!({
                "id": entity.id(),
                "self": entity.uri(),
                "data": Value::Object(properties),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("{} {}", entity.kind(), entity.uri().unwrap_or_default());
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["property", "value"]);
            let mut keys: Vec<&String> = properties.keys().collect();
            keys.sort();
            for key in keys {
                table.add_row(vec![key.clone(), format_json(&properties[key])]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn print_records(result: &RecordBatch, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = result
                .records
                .iter()
                .map(|record| Value::Array(record.values().map(cell_json).collect()))
                .collect();
            let out = json!({"columns": result.columns, "data": rows});
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            if result.columns.is_empty() {
                println!("(no results)");
                return Ok(());
            }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&result.columns);
            for record in &result.records {
                let cells: Vec<String> = record.values().map(format_cell).collect();
                table.add_row(cells);
            }
            println!("{}", table);
            println!("{} row(s)", result.len());
        }
    }
    Ok(())
}

fn print_values(values: &[ResultValue], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let out: Vec<Value> = values.iter().map(cell_json).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            for value in values {
                println!("{}", format_cell(value));
            }
            println!("{} value(s)", values.len());
        }
    }
    Ok(())
}

async fn run_indexes(api: &RestApi, format: &OutputFormat) -> anyhow::Result<()> {
    let manager = api.index();
    let nodes = manager.node_index_names().await?;
    let relationships = manager.relationship_index_names().await?;
    match format {
        OutputFormat::Json => {
            let out = json!({"node": nodes, "relationship": relationships});
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["kind", "name"]);
            for name in nodes {
                table.add_row(vec!["node".to_string(), name]);
            }
            for name in relationships {
                table.add_row(vec!["relationship".to_string(), name]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

async fn run_import(api: &RestApi, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let plan: ImportPlan = match file.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&text)?,
        _ => serde_yaml::from_str(&text)?,
    };

    // Unknown endpoints would abort halfway through recording
    for rel in &plan.relationships {
        for key in [&rel.from, &rel.to] {
            if !plan.nodes.iter().any(|node| &node.key == key) {
                bail!("relationship refers to unknown node '{}'", key);
            }
        }
    }

    let node_count = plan.nodes.len();
    let rel_count = plan.relationships.len();
    let nodes = api
        .execute_batch(|batch| async move {
            let mut nodes: HashMap<String, Node> = HashMap::new();
            for entry in plan.nodes {
                let properties = (!entry.properties.is_empty()).then_some(entry.properties);
                nodes.insert(entry.key, batch.create_node(properties).await?);
            }
            for rel in plan.relationships {
                let (Some(start), Some(end)) = (nodes.get(&rel.from), nodes.get(&rel.to)) else {
                    return Err(RestError::InvalidArgument(format!("{} -> {}", rel.from, rel.to)));
                };
                let properties = (!rel.properties.is_empty()).then_some(rel.properties);
                start.create_relationship_to(end, rel.rel_type.as_str(), properties).await?;
            }
            Ok::<_, RestError>(nodes)
        })
        .await?;

    info!("Imported {} nodes and {} relationships", node_count, rel_count);
    let mut keys: Vec<&String> = nodes.keys().collect();
    keys.sort();
    for key in keys {
        println!("{} -> {}", key, nodes[key].uri().unwrap_or_default());
    }
    Ok(())
}

fn cell_json(value: &ResultValue) -> Value {
    match value {
        ResultValue::Node(node) => json!(node.uri()),
        ResultValue::Relationship(rel) => json!(rel.uri()),
        ResultValue::Value(value) => value.clone(),
        ResultValue::List(items) => Value::Array(items.iter().map(cell_json).collect()),
        ResultValue::Null => Value::Null,
    }
}

fn format_cell(value: &ResultValue) -> String {
    match value {
        ResultValue::Node(node) => format!("({})", node.id().map(|id| id.to_string()).unwrap_or_default()),
        ResultValue::Relationship(rel) => format!("[{}]", rel.id().map(|id| id.to_string()).unwrap_or_default()),
        ResultValue::Value(value) => format_json(value),
        ResultValue::List(items) => {
            let cells: Vec<String> = items.iter().map(format_cell).collect();
            format!("[{}]", cells.join(", "))
        }
        ResultValue::Null => "null".to_string(),
    }
}

fn format_json(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}
