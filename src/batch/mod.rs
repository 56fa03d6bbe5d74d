//! Batch execution engine
//!
//! Mutations issued through a recording facade are appended to an
//! [`OperationLedger`] instead of being sent. Each gets a job id; the
//! objects handed back are placeholders addressed as `{id}`. Executing
//! the batch posts all jobs in one request and patches every
//! placeholder with the server's answer.

pub mod coordinator;
pub mod deferred;
pub mod ledger;
pub mod wire;

pub use coordinator::{BatchCoordinator, BatchReport, DemultiplexedEntry};
pub use deferred::Deferred;
pub use ledger::{Binding, Operation, OperationLedger};
pub use wire::{BatchJob, BatchJobResult, BATCH_PATH};
