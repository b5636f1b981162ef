//! Internal disposal bag for container-owned instances.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ahash::AHashSet;
use tracing::warn;

use crate::error::{DisposeFailure, SharedError};
use crate::internal::panic_message;
use crate::record::ServiceRecord;

/// Records with owned, disposable instances, drained in reverse construction order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    records: Vec<Arc<ServiceRecord>>,
}

impl DisposeBag {
    /// Tracks `record` if it owns anything its disposer should release.
    pub(crate) fn push(&mut self, record: Arc<ServiceRecord>) {
        if record.disposer.is_some() && record.instances.iter().any(|i| i.owned) {
            self.records.push(record);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Runs every disposer, newest construction first. A failing or panicking
    /// disposer does not stop the rest; all failures are returned.
    ///
    /// An instance reachable from several records is disposed once.
    pub(crate) fn run_all_reverse(&mut self) -> Vec<DisposeFailure> {
        let mut records = std::mem::take(&mut self.records);
        records.sort_by(|a, b| b.construction_index.cmp(&a.construction_index));

        let mut failures = Vec::new();
        let mut seen = AHashSet::new();
        for record in &records {
            let Some(disposer) = &record.disposer else { continue };
            for instance in record.instances.iter().filter(|i| i.owned) {
                if !seen.insert(Arc::as_ptr(&instance.value) as *const ()) {
                    continue;
                }
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| disposer(&instance.value)));
                let error = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(error)) => SharedError::new(error),
                    Err(payload) => SharedError::message(format!(
                        "disposer panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                };
                let service = record.name.to_string();
                warn!(%service, %error, "disposer failed");
                failures.push(DisposeFailure { service, error });
            }
        }
        failures
    }
}
