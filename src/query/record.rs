//! Rows returned by the query endpoints

use indexmap::IndexMap;
use serde_json::Value;

use crate::entity::{Node, Relationship};

/// A single result cell
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Node(Node),
    Relationship(Relationship),
    /// Scalars and maps that are not entity representations
    Value(Value),
    List(Vec<ResultValue>),
    Null,
}

impl ResultValue {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            ResultValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            ResultValue::Relationship(rel) => Some(rel),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ResultValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResultValue::Null)
    }
}

/// One result row, keyed by column in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    bindings: IndexMap<String, ResultValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, column: String, value: ResultValue) {
        self.bindings.insert(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&ResultValue> {
        self.bindings.get(column)
    }

    pub fn has(&self, column: &str) -> bool {
        self.bindings.contains_key(column)
    }

    pub fn bindings(&self) -> &IndexMap<String, ResultValue> {
        &self.bindings
    }

    /// Cells in column order
    pub fn values(&self) -> impl Iterator<Item = &ResultValue> {
        self.bindings.values()
    }
}

/// A tabular result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    pub columns: Vec<String>,
}

impl RecordBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            records: Vec::new(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// All values of one column
    pub fn column(&self, column: &str) -> Vec<&ResultValue> {
        self.records.iter().filter_map(|r| r.get(column)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_binding_keeps_column_order() {
        let mut record = Record::new();
        record.bind("b".to_string(), ResultValue::Value(json!(2)));
        record.bind("a".to_string(), ResultValue::Null);

        assert!(record.has("a"));
        assert!(record.get("a").unwrap().is_null());
        let columns: Vec<&String> = record.bindings().keys().collect();
        assert_eq!(columns, vec!["b", "a"]);
    }

    #[test]
    fn test_batch_column() {
        let mut batch = RecordBatch::new(vec!["n".to_string()]);
        for i in 0..3 {
            let mut record = Record::new();
            record.bind("n".to_string(), ResultValue::Value(json!(i)));
            batch.push(record);
        }
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.column("n")[2].as_value(), Some(&json!(2)));
        assert!(batch.column("missing").is_empty());
    }
}
