//! Operation ledger: the recorded, not-yet-executed requests of a batch

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::converter::{ResultConverter, UpdatableResult};
use crate::error::{RestError, RestResult};
use crate::outcome::Outcome;
use crate::request::{is_absolute, join_uri};
use crate::transport::Method;

use super::wire::BatchJob;

/// A placeholder and the converter that will produce its real value
#[derive(Clone)]
pub struct Binding {
    pub target: Arc<dyn UpdatableResult>,
    pub converter: ResultConverter,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("converter", &self.converter)
            .finish()
    }
}

/// One recorded request
#[derive(Debug, Clone)]
pub struct Operation {
    id: u64,
    method: Method,
    uri: String,
    base_uri: String,
    body: Option<Value>,
    binding: Option<Binding>,
}

impl Operation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// Whether the operation was recorded against the given base
    pub fn is_same_uri(&self, base_uri: &str) -> bool {
        self.base_uri == base_uri
    }

    /// Target as sent on the wire: the bare path when recorded against
    /// the batch's own base, otherwise an absolute (or job-reference) URI
    pub fn target(&self, batch_base: &str) -> String {
        if self.is_same_uri(batch_base) || is_absolute(&self.uri) {
            self.uri.clone()
        } else {
            join_uri(&self.base_uri, &self.uri)
        }
    }
}

/// Ordered store of recorded operations keyed by a monotonically
/// increasing id starting at 1
#[derive(Debug)]
pub struct OperationLedger {
    base_uri: String,
    last_id: u64,
    operations: IndexMap<u64, Operation>,
}

impl OperationLedger {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            last_id: 0,
            operations: IndexMap::new(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Record a request and return the deferred outcome standing in for it
    pub fn record(&mut self, method: Method, uri: &str, body: Option<Value>, base_uri: &str) -> Outcome {
        self.last_id += 1;
        let id = self.last_id;
        self.operations.insert(
            id,
            Operation {
                id,
                method,
                uri: uri.to_string(),
                base_uri: base_uri.to_string(),
                body,
                binding: None,
            },
        );
        Outcome::deferred(id)
    }

    pub fn lookup(&self, id: u64) -> RestResult<&Operation> {
        self.operations.get(&id).ok_or(RestError::UnknownOperation(id))
    }

    /// Bind a placeholder and its converter to an already recorded operation
    pub fn attach_result(
        &mut self,
        id: u64,
        target: Arc<dyn UpdatableResult>,
        converter: ResultConverter,
    ) -> RestResult<()> {
        let operation = self
            .operations
            .get_mut(&id)
            .ok_or(RestError::UnknownOperation(id))?;
        operation.binding = Some(Binding { target, converter });
        Ok(())
    }

    /// Operations in recording order
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Wire payload for every recorded operation, in recording order
    pub fn assemble(&self) -> Vec<BatchJob> {
        self.iter()
            .map(|op| BatchJob {
                method: op.method,
                to: op.target(&self.base_uri),
                body: op.body.clone(),
                id: op.id,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ResolvedValue;
    use parking_lot::Mutex;
    use serde_json::json;

    const BASE: &str = "http://localhost:7474/db/data";

    struct Recorder(Mutex<Vec<String>>);

    impl UpdatableResult for Recorder {
        fn update_from(&self, _resolved: ResolvedValue) -> RestResult<()> {
            self.0.lock().push("updated".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_ids_increase_by_one() {
        let mut ledger = OperationLedger::new(BASE);
        for expected in 1..=5u64 {
            let outcome = ledger.record(Method::Post, "node", None, BASE);
            assert_eq!(outcome.batch_id(), Some(expected));
        }
        let ids: Vec<u64> = ledger.iter().map(|op| op.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(ledger.len(), 5);
    }

    #[test]
    fn test_lookup_unknown_id() {
        let ledger = OperationLedger::new(BASE);
        assert!(ledger.is_empty());
        assert!(matches!(ledger.lookup(1), Err(RestError::UnknownOperation(1))));
    }

    #[test]
    fn test_attach_result() {
        let mut ledger = OperationLedger::new(BASE);
        ledger.record(Method::Post, "node", Some(json!({})), BASE);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));

        ledger
            .attach_result(1, recorder.clone(), ResultConverter::PropertyRefresher)
            .unwrap();
        let binding = ledger.lookup(1).unwrap().binding().unwrap().clone();
        assert!(matches!(binding.converter, ResultConverter::PropertyRefresher));
        binding.target.update_from(ResolvedValue::Refresh).unwrap();
        assert_eq!(recorder.0.lock().len(), 1);

        let missing = ledger.attach_result(9, recorder, ResultConverter::PropertyRefresher);
        assert!(matches!(missing, Err(RestError::UnknownOperation(9))));
    }

    #[test]
    fn test_assemble_same_origin_and_absolute_targets() {
        let mut ledger = OperationLedger::new(BASE);
        ledger.record(Method::Post, "node", Some(json!({"name": "Ann"})), BASE);
        ledger.record(Method::Put, "properties/age", Some(json!(31)), &format!("{}/node/4", BASE));
        ledger.record(Method::Post, "relationships", Some(json!({"to": "{1}"})), "{1}");
        ledger.record(Method::Delete, "", None, &format!("{}/relationship/8", BASE));

        let jobs = ledger.assemble();
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].to, "node");
        assert_eq!(jobs[1].to, format!("{}/node/4/properties/age", BASE));
        assert_eq!(jobs[2].to, "{1}/relationships");
        assert_eq!(jobs[3].to, format!("{}/relationship/8", BASE));
        assert_eq!(jobs[3].body, None);
        assert_eq!(jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }
}
