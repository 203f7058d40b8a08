//! Pure rotation planning
//!
//! [`plan`] maps the desired record and what the store currently holds to the
//! operations that converge the two. It performs no I/O, so every branch of
//! the rotation state machine is testable without a store.

use crate::config::ConfigKind;
use crate::core::{CredentialRecord, GenerationClass, RecordLabels, RecordVersion};
use crate::rotation::RotationStrategy;

/// Record the caller wants to end up with.
#[derive(Debug, Clone)]
pub struct Desired<'a> {
    /// Derived name
    pub name: &'a str,
    /// Derived name of the `Old` generation
    pub old_name: &'a str,
    /// `Current`, or `Bundle` for bundle aggregates
    pub class: GenerationClass,
    /// Kind of the generating config
    pub kind: ConfigKind,
    /// Full label set
    pub labels: &'a RecordLabels,
    /// Strategy for the superseded generation
    pub strategy: RotationStrategy,
    /// The name was derived without a checksum
    pub legacy_name: bool,
}

/// What the store holds for the base name.
#[derive(Debug, Clone, Copy)]
pub struct Observed<'a> {
    /// Record stored under exactly the desired name
    pub exact: Option<&'a CredentialRecord>,
    /// All managed generations of the base name
    pub siblings: &'a [CredentialRecord],
}

/// Fate of the target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Already converged; zero writes
    Keep(CredentialRecord),
    /// Payload is reused; labels or kind are rewritten under the stored version
    Relabel(CredentialRecord),
    /// A new generation must be materialized and created
    Create,
}

/// Store operations for one attempt, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Fate of the target
    pub action: Action,
    /// `Old` records to delete before demoting
    pub delete_olds: Vec<String>,
    /// Copy of the prior `Current` to create as `Old`
    pub demote: Option<CredentialRecord>,
    /// Prior or stale records of the target class to delete
    pub delete_currents: Vec<String>,
    /// `Old` record that survives this attempt untouched
    pub retained_old: Option<CredentialRecord>,
}

impl Plan {
    /// Whether executing the plan writes nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self.action, Action::Keep(_))
            && self.delete_olds.is_empty()
            && self.demote.is_none()
            && self.delete_currents.is_empty()
    }
}

/// Decide how to converge `observed` to `desired`.
pub fn plan(desired: &Desired<'_>, observed: Observed<'_>) -> Plan {
    let others: Vec<&CredentialRecord> = observed
        .siblings
        .iter()
        .filter(|r| r.class == desired.class && r.name != desired.name)
        .collect();
    let olds: Vec<&CredentialRecord> = if desired.class == GenerationClass::Current {
        observed
            .siblings
            .iter()
            .filter(|r| r.class == GenerationClass::Old)
            .collect()
    } else {
        Vec::new()
    };

    if let Some(existing) = observed.exact.filter(|r| is_reusable(desired, r)) {
        return Plan {
            action: reconcile(desired, existing),
            delete_olds: Vec::new(),
            demote: None,
            delete_currents: names(&others),
            retained_old: newest(&olds).cloned(),
        };
    }

    let mut prior = others;
    if let Some(exact) = observed.exact {
        prior.push(exact);
    }

    let mut plan = Plan {
        action: Action::Create,
        delete_olds: Vec::new(),
        demote: None,
        delete_currents: names(&prior),
        retained_old: None,
    };

    if desired.class != GenerationClass::Current {
        return plan;
    }

    match desired.strategy {
        RotationStrategy::InPlace => plan.delete_olds = names(&olds),
        RotationStrategy::KeepOld => {
            let same_kind: Vec<&CredentialRecord> = prior
                .iter()
                .copied()
                .filter(|r| r.kind == Some(desired.kind))
                .collect();
            if let Some(source) = newest(&same_kind) {
                plan.delete_olds = names(&olds);
                plan.demote = Some(demote(desired.old_name, source));
            } else {
                // No prior generation to demote: a retained Old of the same
                // kind stays, anything else is superseded.
                let (keep, superseded): (Vec<&CredentialRecord>, Vec<&CredentialRecord>) = olds
                    .iter()
                    .copied()
                    .partition(|r| r.kind == Some(desired.kind));
                plan.delete_olds = names(&superseded);
                plan.retained_old = newest(&keep).cloned();
            }
        }
    }

    plan
}

fn is_reusable(desired: &Desired<'_>, existing: &CredentialRecord) -> bool {
    if existing.class != desired.class {
        return false;
    }
    if existing.kind.is_some_and(|kind| kind != desired.kind) {
        return false;
    }
    let checksum = &existing.labels.checksum_of_config;
    *checksum == desired.labels.checksum_of_config || checksum.is_empty() || desired.legacy_name
}

fn reconcile(desired: &Desired<'_>, existing: &CredentialRecord) -> Action {
    let mut labels = desired.labels.clone();
    labels.persist |= existing.labels.persist;

    if existing.labels == labels && existing.kind == Some(desired.kind) {
        return Action::Keep(existing.clone());
    }
    let mut relabeled = existing.clone();
    relabeled.labels = labels;
    relabeled.kind = Some(desired.kind);
    Action::Relabel(relabeled)
}

// The copy keeps every label, persist included.
fn demote(old_name: &str, source: &CredentialRecord) -> CredentialRecord {
    let mut old = source.clone();
    old.name = old_name.to_string();
    old.class = GenerationClass::Old;
    old.version = RecordVersion::default();
    old
}

fn newest<'a>(records: &[&'a CredentialRecord]) -> Option<&'a CredentialRecord> {
    records.iter().copied().max_by_key(|r| r.version)
}

fn names(records: &[&CredentialRecord]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordData;
    use crate::core::labels::LABEL_VALUE_SECRETS_MANAGER;
    use pretty_assertions::assert_eq;

    fn labels(checksum: &str) -> RecordLabels {
        RecordLabels {
            name: "config".into(),
            managed_by: LABEL_VALUE_SECRETS_MANAGER.into(),
            manager_identity: "test".into(),
            checksum_of_config: checksum.into(),
            rotation_strategy: Some(RotationStrategy::InPlace),
            ..RecordLabels::default()
        }
    }

    fn record(name: &str, class: GenerationClass, checksum: &str, version: u64) -> CredentialRecord {
        let mut record = CredentialRecord::new(name, class, RecordData::new())
            .with_kind(ConfigKind::BasicAuth)
            .with_labels(labels(checksum));
        record.version = RecordVersion(version);
        record
    }

    fn desired<'a>(name: &'a str, labels: &'a RecordLabels, strategy: RotationStrategy) -> Desired<'a> {
        Desired {
            name,
            old_name: "config-old",
            class: GenerationClass::Current,
            kind: ConfigKind::BasicAuth,
            labels,
            strategy,
            legacy_name: false,
        }
    }

    #[test]
    fn fresh_base_name_creates() {
        let want = labels("2");
        let plan = plan(
            &desired("config-bbbb", &want, RotationStrategy::InPlace),
            Observed { exact: None, siblings: &[] },
        );
        assert_eq!(plan.action, Action::Create);
        assert!(plan.delete_currents.is_empty());
        assert!(plan.demote.is_none());
    }

    #[test]
    fn unchanged_checksum_is_a_noop() {
        let want = labels("1");
        let current = record("config-aaaa", GenerationClass::Current, "1", 3);
        let plan = plan(
            &desired("config-aaaa", &want, RotationStrategy::InPlace),
            Observed {
                exact: Some(&current),
                siblings: std::slice::from_ref(&current),
            },
        );
        assert!(plan.is_noop());
        assert_eq!(plan.action, Action::Keep(current));
    }

    #[test]
    fn label_drift_relabels_without_new_material() {
        let mut want = labels("1");
        want.rotation_strategy = Some(RotationStrategy::KeepOld);
        let current = record("config-aaaa", GenerationClass::Current, "1", 3);
        let plan = plan(
            &desired("config-aaaa", &want, RotationStrategy::KeepOld),
            Observed {
                exact: Some(&current),
                siblings: std::slice::from_ref(&current),
            },
        );
        match plan.action {
            Action::Relabel(r) => {
                assert_eq!(r.version, RecordVersion(3));
                assert_eq!(r.labels.rotation_strategy, Some(RotationStrategy::KeepOld));
            }
            other => panic!("expected relabel, got {other:?}"),
        }
    }

    #[test]
    fn persist_is_sticky_on_reuse() {
        let want = labels("1");
        let mut current = record("config-aaaa", GenerationClass::Current, "1", 3);
        current.labels.persist = true;
        let plan = plan(
            &desired("config-aaaa", &want, RotationStrategy::InPlace),
            Observed {
                exact: Some(&current),
                siblings: std::slice::from_ref(&current),
            },
        );
        assert!(plan.is_noop());
    }

    #[test]
    fn keep_old_demotes_prior_current_and_supersedes_old() {
        let want = labels("2");
        let siblings = vec![
            record("config-aaaa", GenerationClass::Current, "1", 5),
            record("config-old", GenerationClass::Old, "0", 2),
        ];
        let plan = plan(
            &desired("config-bbbb", &want, RotationStrategy::KeepOld),
            Observed { exact: None, siblings: &siblings },
        );

        assert_eq!(plan.action, Action::Create);
        assert_eq!(plan.delete_olds, vec!["config-old".to_string()]);
        assert_eq!(plan.delete_currents, vec!["config-aaaa".to_string()]);
        let old = plan.demote.unwrap();
        assert_eq!(old.name, "config-old");
        assert_eq!(old.class, GenerationClass::Old);
        assert_eq!(old.labels.checksum_of_config, "1");
        assert_eq!(old.version, RecordVersion(0));
    }

    #[test]
    fn in_place_deletes_all_olds() {
        let want = labels("2");
        let siblings = vec![
            record("config-aaaa", GenerationClass::Current, "1", 5),
            record("config-old", GenerationClass::Old, "0", 2),
        ];
        let plan = plan(
            &desired("config-bbbb", &want, RotationStrategy::InPlace),
            Observed { exact: None, siblings: &siblings },
        );
        assert_eq!(plan.delete_olds, vec!["config-old".to_string()]);
        assert_eq!(plan.delete_currents, vec!["config-aaaa".to_string()]);
        assert!(plan.demote.is_none());
    }

    #[test]
    fn keep_old_without_prior_current_keeps_old() {
        let want = labels("2");
        let siblings = vec![record("config-old", GenerationClass::Old, "1", 2)];
        let plan = plan(
            &desired("config-bbbb", &want, RotationStrategy::KeepOld),
            Observed { exact: None, siblings: &siblings },
        );
        assert!(plan.delete_olds.is_empty());
        assert_eq!(plan.retained_old.map(|r| r.name), Some("config-old".to_string()));
    }

    #[test]
    fn kind_change_always_creates_and_never_demotes() {
        let want = labels("1");
        let mut rsa = record("config-aaaa", GenerationClass::Current, "1", 5);
        rsa.kind = Some(ConfigKind::RsaKeypair);
        let plan = plan(
            &desired("config-aaaa", &want, RotationStrategy::KeepOld),
            Observed {
                exact: Some(&rsa),
                siblings: std::slice::from_ref(&rsa),
            },
        );
        assert_eq!(plan.action, Action::Create);
        assert_eq!(plan.delete_currents, vec!["config-aaaa".to_string()]);
        assert!(plan.demote.is_none());
    }

    #[test]
    fn stale_siblings_are_deleted_on_reuse() {
        let want = labels("1");
        let current = record("config-aaaa", GenerationClass::Current, "1", 5);
        let siblings = vec![
            current.clone(),
            record("config-cccc", GenerationClass::Current, "9", 4),
        ];
        let plan = plan(
            &desired("config-aaaa", &want, RotationStrategy::InPlace),
            Observed {
                exact: Some(&current),
                siblings: &siblings,
            },
        );
        assert!(matches!(plan.action, Action::Keep(_)));
        assert_eq!(plan.delete_currents, vec!["config-cccc".to_string()]);
    }

    #[test]
    fn unmanaged_record_under_desired_name_is_adopted() {
        let want = labels("1");
        let legacy = CredentialRecord::new("config", GenerationClass::Current, RecordData::new());
        let plan = plan(
            &desired("config", &want, RotationStrategy::InPlace),
            Observed {
                exact: Some(&legacy),
                siblings: &[],
            },
        );
        match plan.action {
            Action::Relabel(r) => {
                assert_eq!(r.labels.checksum_of_config, "1");
                assert_eq!(r.kind, Some(ConfigKind::BasicAuth));
            }
            other => panic!("expected adoption, got {other:?}"),
        }
    }

    #[test]
    fn legacy_name_adopts_despite_checksum_change() {
        let want = labels("2");
        let existing = record("config", GenerationClass::Current, "1", 5);
        let mut wanted = desired("config", &want, RotationStrategy::InPlace);
        wanted.legacy_name = true;
        let plan = plan(
            &wanted,
            Observed {
                exact: Some(&existing),
                siblings: std::slice::from_ref(&existing),
            },
        );
        assert!(matches!(plan.action, Action::Relabel(_)));
    }

    #[test]
    fn changed_bundle_is_superseded_without_touching_olds() {
        let mut want = labels("2");
        want.name = "ca".into();
        let bundle = record("ca-bundle", GenerationClass::Bundle, "1", 5);
        let old = record("ca-old", GenerationClass::Old, "1", 2);
        let siblings = vec![bundle.clone(), old];
        let wanted = Desired {
            class: GenerationClass::Bundle,
            ..desired("ca-bundle", &want, RotationStrategy::InPlace)
        };
        let plan = plan(
            &wanted,
            Observed {
                exact: Some(&bundle),
                siblings: &siblings,
            },
        );
        assert_eq!(plan.action, Action::Create);
        assert_eq!(plan.delete_currents, vec!["ca-bundle".to_string()]);
        assert!(plan.delete_olds.is_empty());
    }

    #[test]
    fn persisted_old_is_retained_untouched() {
        let want = labels("1");
        let current = record("config-aaaa", GenerationClass::Current, "1", 5);
        let mut old = record("config-old", GenerationClass::Old, "0", 2);
        old.labels.persist = true;
        let siblings = vec![current.clone(), old.clone()];
        let plan = plan(
            &desired("config-aaaa", &want, RotationStrategy::KeepOld),
            Observed {
                exact: Some(&current),
                siblings: &siblings,
            },
        );
        assert!(plan.is_noop());
        assert_eq!(plan.retained_old, Some(old));
    }

    #[test]
    fn demoted_copy_keeps_persist() {
        let mut want = labels("2");
        want.persist = true;
        let mut current = record("config-aaaa", GenerationClass::Current, "1", 5);
        current.labels.persist = true;
        let plan = plan(
            &desired("config-bbbb", &want, RotationStrategy::KeepOld),
            Observed {
                exact: None,
                siblings: std::slice::from_ref(&current),
            },
        );
        let old = plan.demote.as_ref().unwrap();
        assert!(old.labels.persist);
        assert!(!plan.is_noop());
    }
}
