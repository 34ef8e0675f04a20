//! Reconciliation of the form model with new specifications.
//!
//! Two events move specifications into the form: a fresh canonicalization of
//! the declarative source (a new commit), and a successful remote validation
//! that may have amended the submitted specification. Both produce a new
//! model with [`to_client_model`]; they differ only in which leaves end up
//! source-locked.

use appspec_core::AppSpecification;
use tracing::info;

use crate::adapter::to_client_model;
use crate::locks::FieldLocks;
use crate::model::ClientAppModel;

/// Service-level effect of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub kept: Vec<String>,
    pub added: Vec<String>,
    pub dropped: Vec<String>,
}

impl ReconcileSummary {
    fn between(before: &ClientAppModel, after: &ClientAppModel) -> Self {
        let mut summary = Self::default();
        for name in after.services.keys() {
            if before.services.contains_key(name) {
                summary.kept.push(name.clone());
            } else {
                summary.added.push(name.clone());
            }
        }
        summary.dropped = before
            .services
            .keys()
            .filter(|name| !after.services.contains_key(*name))
            .cloned()
            .collect();
        summary
    }
}

/// Merge a freshly canonicalized source into the form.
///
/// `locks` are the leaves the source document declares, usually from
/// [`FieldLocks::declared_in`]. Locks the model held before are released
/// unless the new source declares them again.
pub fn apply_source(
    current: &ClientAppModel,
    spec: &AppSpecification,
    locks: &FieldLocks,
) -> (ClientAppModel, ReconcileSummary) {
    let next = to_client_model(spec, locks, Some(current));
    let summary = ReconcileSummary::between(current, &next);
    info!(
        app = %spec.name,
        kept = summary.kept.len(),
        added = summary.added.len(),
        dropped = ?summary.dropped,
        "reconciled form with app source"
    );
    (next, summary)
}

/// Merge a remotely validated specification into the form.
///
/// Existing locks are kept, and every leaf the validator set or changed
/// becomes locked as well. Leaves it echoed back unchanged keep the user's
/// value and editability.
pub fn apply_validated(
    current: &ClientAppModel,
    submitted: &AppSpecification,
    validated: &AppSpecification,
) -> (ClientAppModel, ReconcileSummary) {
    let amended = FieldLocks::amended(submitted, validated);
    let locks = current.locks().union(&amended);
    let next = to_client_model(validated, &locks, Some(current));
    let summary = ReconcileSummary::between(current, &next);
    info!(
        app = %validated.name,
        amended = amended.len(),
        added = summary.added.len(),
        dropped = ?summary.dropped,
        "reconciled form with validated specification"
    );
    (next, summary)
}
