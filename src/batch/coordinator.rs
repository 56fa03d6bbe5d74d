//! Batch coordinator
//!
//! Owns one recording session: hands out the recording facade, then
//! assembles the ledger into a single `POST batch`, correlates the
//! response entries with the ledger by id and patches every bound
//! placeholder.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::RestApi;
use crate::converter::{ResolvedValue, UpdatableResult};
use crate::error::{RestError, RestResult};
use crate::outcome::Outcome;
use crate::request::{RecordingRequest, RestRequest};

use super::ledger::OperationLedger;
use super::wire::{parse_batch_response, BatchJob, BatchJobResult, BATCH_PATH};

/// One response entry after correlation with the ledger
pub struct DemultiplexedEntry {
    pub id: u64,
    pub outcome: Outcome,
    conversion: Option<(Arc<dyn UpdatableResult>, RestResult<ResolvedValue>)>,
}

impl DemultiplexedEntry {
    /// Whether a placeholder is waiting for this entry
    pub fn is_bound(&self) -> bool {
        self.conversion.is_some()
    }
}

impl std::fmt::Debug for DemultiplexedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemultiplexedEntry")
            .field("id", &self.id)
            .field("outcome", &self.outcome)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// What happened to the entries of an executed batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Response entries received
    pub entries: usize,
    /// Placeholders updated
    pub patched: usize,
    /// Entries whose result could not be converted or applied
    pub failures: Vec<(u64, RestError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// `PartialBatch` when any entry failed
    pub fn into_result(self) -> RestResult<()> {
        let mut failures = self.failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some((id, first)) => {
                let mut failed = vec![id];
                failed.extend(failures.map(|(id, _)| id));
                Err(RestError::PartialBatch {
                    failed,
                    first: Box::new(first),
                })
            }
        }
    }
}

/// A single recording session
pub struct BatchCoordinator {
    parent: RestApi,
    batch_api: RestApi,
    recording: RecordingRequest,
    ledger: Arc<Mutex<OperationLedger>>,
}

impl BatchCoordinator {
    pub(crate) fn begin(parent: &RestApi) -> RestResult<Self> {
        if parent.is_recording() {
            return Err(RestError::NestedBatch);
        }
        let ledger = Arc::new(Mutex::new(OperationLedger::new(parent.base_uri())));
        let recording = RecordingRequest::new(parent.base_uri(), ledger.clone());
        let batch_api = parent.recording_child(recording.clone());
        debug!("Recording batch against {}", parent.base_uri());
        Ok(Self {
            parent: parent.clone(),
            batch_api,
            recording,
            ledger,
        })
    }

    /// Facade whose mutations are recorded into this batch
    pub fn api(&self) -> &RestApi {
        &self.batch_api
    }

    /// Number of recorded operations
    pub fn len(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().is_empty()
    }

    /// Wire payload for everything recorded so far
    pub fn assemble(&self) -> Vec<BatchJob> {
        self.ledger.lock().assemble()
    }

    /// Send the jobs in one round trip
    pub async fn send(&self, jobs: &[BatchJob]) -> RestResult<Vec<BatchJobResult>> {
        info!("Sending batch of {} operations to {}", jobs.len(), self.parent.base_uri());
        let body = serde_json::to_value(jobs)?;
        let outcome = self
            .parent
            .direct()
            .post(BATCH_PATH, body)
            .await
            .map_err(|e| RestError::BatchTransport(Box::new(e)))?;

        // Error pages need not be JSON
        if !outcome.is_success() {
            return Err(outcome.error_for("batch"));
        }
        parse_batch_response(&outcome.to_value()?)
    }

    /// Correlate response entries with recorded operations by id and run
    /// the bound converters. Entries come back in ledger order.
    pub fn demultiplex(&self, results: Vec<BatchJobResult>) -> RestResult<Vec<DemultiplexedEntry>> {
        let ledger = self.ledger.lock();
        let mut entries = Vec::with_capacity(results.len());
        for result in &results {
            let operation = ledger.lookup(result.id)?;
            let outcome = Outcome::from_batch_entry(result);
            let conversion = operation.binding().map(|binding| {
                let converted = binding.converter.convert(&outcome, &self.parent);
                (binding.target.clone(), converted)
            });
            entries.push(DemultiplexedEntry {
                id: result.id,
                outcome,
                conversion,
            });
        }
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    /// Apply converted values to their placeholders in ledger order.
    /// A bound operation the response never mentions is a failure.
    pub fn patch_entities(&self, entries: Vec<DemultiplexedEntry>) -> BatchReport {
        let mut report = BatchReport {
            entries: entries.len(),
            ..BatchReport::default()
        };
        let answered: HashSet<u64> = entries.iter().map(|entry| entry.id).collect();
        for entry in entries {
            let (target, converted) = match entry.conversion {
                Some(conversion) => conversion,
                None => continue,
            };
            match converted.and_then(|value| target.update_from(value)) {
                Ok(()) => report.patched += 1,
                Err(e) => {
                    warn!("Batch entry {} failed: {}", entry.id, e);
                    report.failures.push((entry.id, e));
                }
            }
        }
        for operation in self.ledger.lock().iter() {
            if operation.binding().is_some() && !answered.contains(&operation.id()) {
                let id = operation.id();
                warn!("Batch response has no entry for job {}", id);
                report
                    .failures
                    .push((id, RestError::ProtocolMismatch(format!("no response entry for job {}", id))));
            }
        }
        report.failures.sort_by_key(|(id, _)| *id);
        report
    }

    /// Refuse further recording
    pub fn stop(&self) {
        self.recording.stop();
    }

    /// Stop recording and discard the ledger
    pub fn end_batch(&self) {
        self.stop();
        let base = self.ledger.lock().base_uri().to_string();
        *self.ledger.lock() = OperationLedger::new(base);
    }

    /// Send everything recorded and resolve the placeholders
    pub async fn execute(self) -> RestResult<BatchReport> {
        self.stop();
        let jobs = self.assemble();
        if jobs.is_empty() {
            debug!("Batch is empty, nothing to send");
            self.end_batch();
            return Ok(BatchReport::default());
        }

        let results = self.send(&jobs).await?;
        let entries = self.demultiplex(results)?;
        let report = self.patch_entities(entries);
        self.end_batch();

        if report.is_complete() {
            info!("Batch resolved: {} entries, {} patched", report.entries, report.patched);
        } else {
            warn!(
                "Batch partially resolved: {} entries, {} patched, {} failed",
                report.entries,
                report.patched,
                report.failures.len()
            );
        }
        Ok(report)
    }
}

impl Drop for BatchCoordinator {
    fn drop(&mut self) {
        self.recording.stop();
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("base_uri", &self.parent.base_uri())
            .field("operations", &self.len())
            .field("stopped", &self.recording.is_stopped())
            .finish()
    }
}
