pub mod reconciliation_worker;

pub use reconciliation_worker::{PassReport, ReconciliationWorker, WorkerConfig};
