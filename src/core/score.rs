//! Weighted completion scoring.
//!
//! Score = pass weight / applicable weight * 100, rounded to one decimal.
//! N/A items are an applicability exemption: they leave both the numerator and
//! the denominator. This weight-ratio formula is the single canonical one;
//! averaging per-item binary scores (including N/A) is not equivalent and is
//! deliberately absent from this crate.

use crate::core::model::{InspectionItem, ItemStatus};

/// Computes the 0-100 completion score for the current item list.
///
/// Zero applicable weight (no items, or everything N/A) scores 0.0. Callers
/// that want "fully exempted counts as pass" must detect that case themselves.
pub fn weighted_score(items: &[InspectionItem]) -> f64 {
    let mut total_weight: u64 = 0;
    let mut pass_weight: u64 = 0;
    for item in items {
        match item.status {
            ItemStatus::Na => {}
            ItemStatus::Ok => {
                total_weight += u64::from(item.weight);
                pass_weight += u64::from(item.weight);
            }
            ItemStatus::Pending | ItemStatus::NotOk => {
                total_weight += u64::from(item.weight);
            }
        }
    }
    if total_weight == 0 {
        return 0.0;
    }
    round1(pass_weight as f64 / total_weight as f64 * 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
