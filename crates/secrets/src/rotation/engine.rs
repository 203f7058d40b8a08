//! Plan execution with re-read-then-write retries

use std::collections::HashMap;

use parking_lot::Mutex;

use super::plan::{Action, Desired, Observed, Plan, plan};
use super::retry::{AttemptError, RetryPolicy, retry_on_conflict};
use super::RotationStrategy;
use crate::config::{MaterializeContext, SecretConfig};
use crate::core::{CredentialRecord, GenerationClass, RecordData, RecordLabels, SecretsResult, StoreError};
use crate::store::{SecretStore, Selector};

/// One convergence request for a single base name.
#[derive(Debug)]
pub(crate) struct RotationRequest<'a> {
    pub config: &'a SecretConfig,
    pub name: String,
    pub old_name: String,
    pub class: GenerationClass,
    pub labels: RecordLabels,
    pub strategy: RotationStrategy,
    pub legacy_name: bool,
    pub ignore_old: bool,
    pub signing_ca: Option<&'a CredentialRecord>,
}

/// Records a convergence left in place.
#[derive(Debug, Clone)]
pub(crate) struct Generation {
    pub current: CredentialRecord,
    /// Retained `Old`, unless ignored
    pub old: Option<CredentialRecord>,
}

/// Converge the store to `request`, retrying lost races.
///
/// Material is generated at most once per derived name, however many attempts
/// the retry loop makes.
pub(crate) async fn converge(
    store: &dyn SecretStore,
    policy: &RetryPolicy,
    request: &RotationRequest<'_>,
) -> SecretsResult<Generation> {
    let materialized = Mutex::new(HashMap::new());
    retry_on_conflict(policy, &request.labels.name, || {
        attempt(store, request, &materialized)
    })
    .await
}

async fn attempt(
    store: &dyn SecretStore,
    request: &RotationRequest<'_>,
    materialized: &Mutex<HashMap<String, RecordData>>,
) -> Result<Generation, AttemptError> {
    let exact = match store.get(&request.name).await {
        Ok(record) => Some(record),
        Err(StoreError::NotFound { .. }) => None,
        Err(err) => return Err(AttemptError::Fatal(err.into())),
    };
    let selector = Selector::generations_of(&request.labels.name, &request.labels.manager_identity);
    let siblings = store.list(&selector).await.map_err(fatal)?;

    let desired = Desired {
        name: &request.name,
        old_name: &request.old_name,
        class: request.class,
        kind: request.config.kind(),
        labels: &request.labels,
        strategy: request.strategy,
        legacy_name: request.legacy_name,
    };
    let plan = plan(
        &desired,
        Observed {
            exact: exact.as_ref(),
            siblings: &siblings,
        },
    );
    if plan.is_noop() {
        tracing::trace!(name = %request.labels.name, record = %request.name, "store already converged");
    }
    execute(store, request, plan, materialized).await
}

async fn execute(
    store: &dyn SecretStore,
    request: &RotationRequest<'_>,
    plan: Plan,
    materialized: &Mutex<HashMap<String, RecordData>>,
) -> Result<Generation, AttemptError> {
    let base = request.labels.name.as_str();
    let Plan {
        action,
        delete_olds,
        demote,
        delete_currents,
        retained_old,
    } = plan;

    let mut old = retained_old;
    let current = match action {
        Action::Keep(record) => {
            tracing::debug!(name = %base, record = %record.name, "credential unchanged");
            delete_all(store, base, &delete_currents).await?;
            record
        }
        Action::Relabel(record) => {
            let expected = record.version;
            let record = store.update(record, expected).await?;
            tracing::info!(name = %base, record = %record.name, "credential relabeled");
            delete_all(store, base, &delete_currents).await?;
            record
        }
        Action::Create => {
            let data = materialize(request, materialized)?;
            delete_all(store, base, &delete_olds).await?;
            if let Some(copy) = demote {
                let copy = store.create(copy).await?;
                tracing::info!(name = %base, record = %copy.name, "prior generation retained as old");
                old = Some(copy);
            }
            delete_all(store, base, &delete_currents).await?;

            let record = CredentialRecord::new(request.name.clone(), request.class, data)
                .with_kind(request.config.kind())
                .with_labels(request.labels.clone());
            let record = store.create(record).await?;
            tracing::info!(
                name = %base,
                record = %record.name,
                class = %record.class,
                strategy = %request.strategy,
                "new generation created"
            );
            record
        }
    };

    let old = old.filter(|_| request.strategy == RotationStrategy::KeepOld && !request.ignore_old);
    Ok(Generation { current, old })
}

fn materialize(
    request: &RotationRequest<'_>,
    materialized: &Mutex<HashMap<String, RecordData>>,
) -> Result<RecordData, AttemptError> {
    if let Some(data) = materialized.lock().get(&request.name) {
        return Ok(data.clone());
    }
    let data = request.config.materialize(&MaterializeContext {
        record_name: &request.name,
        signing_ca: request.signing_ca,
    })?;
    materialized.lock().insert(request.name.clone(), data.clone());
    Ok(data)
}

// Deleting a record that is already gone counts as success.
async fn delete_all(store: &dyn SecretStore, base: &str, names: &[String]) -> Result<(), AttemptError> {
    for name in names {
        match store.delete(name).await {
            Ok(()) => tracing::info!(name = %base, record = %name, "superseded record deleted"),
            Err(StoreError::NotFound { .. }) => {}
            Err(err) => return Err(fatal(err)),
        }
    }
    Ok(())
}

fn fatal(err: StoreError) -> AttemptError {
    AttemptError::Fatal(err.into())
}
