//! Garbage collection of retired records

use futures::future::join_all;
use tracing::{info, warn};

use super::SecretsManager;
use crate::core::{CleanupFailure, SecretsError, SecretsResult, StoreError};
use crate::store::Selector;

impl SecretsManager {
    /// Delete every managed record that was neither generated nor retained
    /// in this run and is not persisted.
    ///
    /// Deletions run concurrently. A failed deletion does not stop the
    /// others; all failures are reported together in
    /// [`SecretsError::CleanupFailed`] while the successful deletions stay
    /// applied.
    pub async fn cleanup(&self) -> SecretsResult<()> {
        let records = self
            .store
            .list(&Selector::managed_by(&self.config.identity))
            .await?;
        let in_use = self.index.read().in_use();

        let retired: Vec<String> = records
            .into_iter()
            .filter(|record| !record.labels.persist && !in_use.contains(&record.name))
            .map(|record| record.name)
            .collect();
        if retired.is_empty() {
            return Ok(());
        }

        let results = join_all(retired.iter().map(|name| async move {
            (name, self.store.delete(name).await)
        }))
        .await;

        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(()) => info!(record = %name, "retired record deleted"),
                Err(StoreError::NotFound { .. }) => {}
                Err(error) => {
                    warn!(record = %name, error = %error, "failed to delete retired record");
                    failures.push(CleanupFailure {
                        name: name.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SecretsError::CleanupFailed { failures })
        }
    }
}
