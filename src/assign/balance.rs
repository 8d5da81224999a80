//! Idempotent application of assignments to agreement balances

use tracing::debug;

use crate::traits::{AgreementStore, RecordStore};
use crate::types::*;

/// Apply an assigned record to its agreement's running balance
///
/// Must only be called for assigned results (`confidence != None`). The
/// dedup key `(agreement_id, external_ref)` is checked before any mutation,
/// so re-running an import leaves the balance unchanged; the returned
/// update reports `applied = false` in that case.
pub async fn apply_assignment<S>(
    store: &mut S,
    result: &AssignmentResult,
) -> ImportResult<BalanceUpdate>
where
    S: AgreementStore + RecordStore,
{
    let agreement_id = match (result.confidence, result.agreement_id) {
        (Confidence::None, _) | (_, None) => {
            return Err(ImportError::Validation(
                "cannot apply an unassigned record to a balance".to_string(),
            ));
        }
        (_, Some(id)) => id,
    };

    let key = DedupKey::new(agreement_id, result.record.external_ref.clone());

    if store.assignment_applied(&key).await? {
        let agreement = store
            .get_agreement(agreement_id)
            .await?
            .ok_or(ImportError::AgreementNotFound(agreement_id))?;
        debug!(
            external_ref = %key.external_ref,
            agreement = %agreement_id,
            "assignment already applied, balance untouched"
        );
        return Ok(BalanceUpdate {
            agreement_id,
            previous_balance: agreement.balance.clone(),
            new_balance: agreement.balance,
            applied: false,
        });
    }

    store.insert_financial_record(&result.record).await?;

    // The store re-checks the dedup key under its own serialization point,
    // covering the race between two concurrent sessions.
    let update = store
        .update_agreement_balance(agreement_id, &result.record.balance_delta(), &key)
        .await?;

    debug!(
        external_ref = %key.external_ref,
        agreement = %agreement_id,
        applied = update.applied,
        "balance update"
    );

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::MemoryStore;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn record(external_ref: &str, amount: i32, record_type: RecordType) -> FinancialRecord {
        let details = match record_type {
            RecordType::Payment => RecordDetails::Payment {
                method: PaymentMethod::Card,
                agreement_ref: None,
                customer_name: None,
            },
            RecordType::Fine => RecordDetails::Fine {
                category: FineCategory::Speeding,
                license_plate: None,
                agreement_ref: None,
                customer_name: None,
            },
        };
        FinancialRecord {
            external_ref: external_ref.to_string(),
            amount: BigDecimal::from(amount),
            occurred_on: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            details,
            raw: RawRow::new(),
        }
    }

    #[tokio::test]
    async fn payment_reduces_balance_fine_increases_it() {
        let mut store = MemoryStore::new();
        let mut agreement = Agreement::new(
            "AGR-1001",
            "Alice Kamau",
            "AB-123-CD",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        agreement.balance = BigDecimal::from(1000);
        let id = agreement.id;
        store.insert_agreement(agreement);

        let payment = AssignmentResult::assigned(
            record("TXN-1", 300, RecordType::Payment),
            id,
            Confidence::Exact,
        );
        let update = apply_assignment(&mut store, &payment).await.unwrap();
        assert!(update.applied);
        assert_eq!(update.new_balance, BigDecimal::from(700));

        let fine = AssignmentResult::assigned(
            record("FIN-1", 90, RecordType::Fine),
            id,
            Confidence::Heuristic,
        );
        let update = apply_assignment(&mut store, &fine).await.unwrap();
        assert_eq!(update.new_balance, BigDecimal::from(790));
    }

    #[tokio::test]
    async fn reapplying_the_same_reference_is_a_no_op() {
        let mut store = MemoryStore::new();
        let agreement = Agreement::new(
            "AGR-1001",
            "Alice Kamau",
            "AB-123-CD",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let id = agreement.id;
        store.insert_agreement(agreement);

        let assignment = AssignmentResult::assigned(
            record("TXN-9", 250, RecordType::Payment),
            id,
            Confidence::Exact,
        );

        let first = apply_assignment(&mut store, &assignment).await.unwrap();
        assert!(first.applied);
        assert_eq!(first.new_balance, BigDecimal::from(-250));

        let second = apply_assignment(&mut store, &assignment).await.unwrap();
        assert!(!second.applied);
        assert_eq!(second.new_balance, BigDecimal::from(-250));
    }

    #[tokio::test]
    async fn refusing_unassigned_results() {
        let mut store = MemoryStore::new();
        let unassigned = AssignmentResult::unassigned(record("TXN-2", 10, RecordType::Payment));
        let err = apply_assignment(&mut store, &unassigned).await.unwrap_err();
        assert!(matches!(err, ImportError::Validation(_)));
    }
}
