//! Agreement matching for imported financial records

use crate::import::normalize::canonical_plate;
use crate::types::*;

/// Decide which agreement, if any, a record belongs to
///
/// Priority order, first success wins:
/// 1. exact identifier — the record's agreement reference equals exactly
///    one live agreement's number or id;
/// 2. heuristic — a secondary key (license plate or customer name) matches
///    exactly one candidate whose rental period contains the record date;
/// 3. none — the record stays unassigned for manual resolution.
///
/// Ambiguity always resolves to no match: a wrong assignment of money is
/// worse than a pending one.
pub fn assign(record: &FinancialRecord, candidates: &[Agreement]) -> AssignmentResult {
    if let Some(reference) = record.agreement_ref() {
        let exact: Vec<&Agreement> = candidates
            .iter()
            .filter(|agreement| agreement.is_active() && matches_reference(agreement, reference))
            .collect();
        if exact.len() == 1 {
            return AssignmentResult::assigned(record.clone(), exact[0].id, Confidence::Exact);
        }
    }

    let heuristic: Vec<&Agreement> = candidates
        .iter()
        .filter(|agreement| matches_heuristic(record, agreement))
        .collect();
    if heuristic.len() == 1 {
        return AssignmentResult::assigned(record.clone(), heuristic[0].id, Confidence::Heuristic);
    }

    AssignmentResult::unassigned(record.clone())
}

fn matches_reference(agreement: &Agreement, reference: &str) -> bool {
    let reference = reference.trim();
    agreement.agreement_number == reference
        || reference.eq_ignore_ascii_case(&agreement.id.to_string())
}

/// Secondary-key match: plate or customer name, plus date containment
///
/// Closed agreements still qualify here; a fine incurred during a past
/// rental belongs to that rental.
fn matches_heuristic(record: &FinancialRecord, agreement: &Agreement) -> bool {
    if !agreement.covers(record.occurred_on) {
        return false;
    }

    let plate_matches = record
        .license_plate()
        .map(|plate| canonical_plate(plate) == canonical_plate(&agreement.vehicle_plate))
        .unwrap_or(false);

    let name_matches = record
        .customer_name()
        .map(|name| name.trim().eq_ignore_ascii_case(agreement.customer_name.trim()))
        .unwrap_or(false);

    plate_matches || name_matches
}
