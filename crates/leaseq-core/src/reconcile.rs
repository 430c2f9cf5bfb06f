use crate::error::AppError;
use crate::models::{ItemResult, SubmitReport};
use crate::store::ItemStore;

/// Writes worker results back into the store and releases their leases.
#[derive(Clone)]
pub struct ResultReconciler<S: ItemStore> {
    store: S,
}

impl<S: ItemStore> ResultReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Apply a batch as one atomic write.
    ///
    /// Rows without a lease epoch overwrite unconditionally, even if their
    /// lease expired and the item was reclaimed. Rows with an epoch that no
    /// longer matches are reported as stale and left untouched. Unknown ids
    /// are reported without blocking their siblings. If the store rejects
    /// the write, no row changes and the error is returned as-is.
    pub async fn submit(&self, results: &[ItemResult]) -> Result<SubmitReport, AppError> {
        let outcomes = self.store.apply_results(results).await.inspect_err(|e| {
            tracing::error!(rows = results.len(), error = %e, "Submit batch rejected by store");
        })?;

        let report = SubmitReport::from_outcomes(outcomes);
        for err in &report.per_item_errors {
            tracing::warn!(id = %err.id, reason = %err.reason, "Submitted row not applied");
        }
        tracing::info!(
            applied = report.applied.len(),
            rejected = report.per_item_errors.len(),
            "Reconciled submit batch"
        );

        Ok(report)
    }
}
