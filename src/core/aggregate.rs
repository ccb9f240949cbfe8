//! Phase aggregation: merges every inspection run recorded against one
//! (project, phase) pair into a single authoritative view for reporting.
//!
//! The latest-submitted run donates the metadata; items from every run are
//! retained so re-inspections never erase the audit history of earlier runs.

use crate::core::model::{
    InspectionInstance, InspectionItem, InstanceStatus, Phase, Principal, Signature,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Report-ready representation of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseView {
    pub phase: Phase,
    pub status: InstanceStatus,
    pub score: f64,
    pub comments: String,
    pub review_comments: Option<String>,
    pub inspector: Principal,
    pub submitted_at: Option<i64>,
    pub items: Vec<InspectionItem>,
    pub signatures: Vec<Signature>,
}

/// Builds the phase view, or `None` when no runs exist for the phase.
pub fn aggregate_phase(phase: &Phase, instances: &[InspectionInstance]) -> Option<PhaseView> {
    let donor = metadata_donor(instances)?;

    // Union of items across runs, oldest run first so the audit trail reads
    // chronologically, then natural code order (stable sort keeps run order
    // within one code).
    let mut ordered: Vec<&InspectionInstance> = instances.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let mut items: Vec<InspectionItem> = ordered
        .iter()
        .flat_map(|i| i.items.iter().cloned())
        .collect();
    items.sort_by(|a, b| a.code.cmp(&b.code));

    Some(PhaseView {
        phase: phase.clone(),
        status: donor.status,
        score: donor.score,
        comments: donor.comments.clone(),
        review_comments: donor.review_comments.clone(),
        inspector: donor.inspector.clone(),
        submitted_at: donor.submitted_at,
        items,
        signatures: dedup_signatures(instances.iter().flat_map(|i| i.signatures.iter())),
    })
}

/// Latest non-null `submitted_at` wins; when nothing was submitted yet, the
/// latest `created_at` wins. Ties break on the instance id so the result is
/// deterministic.
fn metadata_donor(instances: &[InspectionInstance]) -> Option<&InspectionInstance> {
    let submitted = instances
        .iter()
        .filter(|i| i.submitted_at.is_some())
        .max_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
    match submitted {
        Some(donor) => Some(donor),
        None => instances
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))),
    }
}

/// One signature per (signer identity, role) pair, keeping the most recent.
/// Output order is (signer id, role) so downstream layout is deterministic.
pub fn dedup_signatures<'a, I>(signatures: I) -> Vec<Signature>
where
    I: IntoIterator<Item = &'a Signature>,
{
    let mut latest: FxHashMap<(String, String), Signature> = FxHashMap::default();
    for sig in signatures {
        let key = (sig.signer.id.clone(), sig.role.clone());
        match latest.get(&key) {
            Some(existing) if existing.signed_at >= sig.signed_at => {}
            _ => {
                latest.insert(key, sig.clone());
            }
        }
    }
    let mut out: Vec<Signature> = latest.into_values().collect();
    out.sort_by(|a, b| {
        a.signer
            .id
            .cmp(&b.signer.id)
            .then_with(|| a.role.cmp(&b.role))
    });
    out
}
