//! Integration tests for fleet-imports

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use fleet_imports::{
    Agreement, AgreementFilter, AgreementStore, BalanceUpdate, BatchStatus, Confidence, DedupKey,
    FinancialRecord, ImportError, ImportOptions, ImportResult, ImportSession, MemoryStore, RawRow,
    RecordStore, RecordType,
};
use std::collections::HashSet;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn options() -> ImportOptions {
    ImportOptions {
        reference_date: date(2024, 6, 1),
        max_future_days: 1,
    }
}

fn payment_headers() -> Vec<String> {
    [
        "payment_ref",
        "payment_date",
        "amount",
        "agreement_no",
        "method",
        "customer_name",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn payment_row(
    reference: &str,
    day: &str,
    amount: &str,
    agreement: &str,
    customer: &str,
) -> RawRow {
    RawRow::from_pairs(vec![
        ("payment_ref".to_string(), reference.to_string()),
        ("payment_date".to_string(), day.to_string()),
        ("amount".to_string(), amount.to_string()),
        ("agreement_no".to_string(), agreement.to_string()),
        ("method".to_string(), "bank transfer".to_string()),
        ("customer_name".to_string(), customer.to_string()),
    ])
}

/// Store that can exactly and heuristically match two agreements
fn seeded_store() -> (MemoryStore, Agreement, Agreement) {
    let store = MemoryStore::new();

    let mut first = Agreement::new("AGR-1001", "Alice Kamau", "AB-123-CD", date(2024, 1, 1));
    first.end_date = Some(date(2024, 12, 31));
    let mut second = Agreement::new("AGR-1002", "Brian Otieno", "EF-456-GH", date(2024, 3, 1));
    second.end_date = Some(date(2024, 9, 30));

    store.insert_agreement(first.clone());
    store.insert_agreement(second.clone());
    (store, first, second)
}

#[tokio::test]
async fn mixed_batch_produces_the_expected_report() {
    let (store, first, second) = seeded_store();
    let mut session = ImportSession::with_options(store.clone(), options());

    // Row 1: exact agreement number. Row 2: missing amount. Row 3: no
    // identifier, but the customer name and date match exactly one
    // agreement.
    let rows = vec![
        payment_row("TXN-1", "2024-05-01", "500.00", "AGR-1001", ""),
        payment_row("TXN-2", "2024-05-02", "", "AGR-1001", ""),
        payment_row("TXN-3", "2024-05-03", "200.00", "", "Brian Otieno"),
    ];

    let report = session
        .run(RecordType::Payment, &payment_headers(), rows)
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::PartiallyCompleted);
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.valid_rows, 2);
    assert_eq!(report.invalid_rows, 1);

    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].row_index, 2);
    assert_eq!(report.issues[0].field, "amount");

    let assigned: Vec<_> = report.assigned().collect();
    assert_eq!(assigned.len(), 2);
    assert_eq!(assigned[0].agreement_id, Some(first.id));
    assert_eq!(assigned[0].confidence, Confidence::Exact);
    assert_eq!(assigned[0].amount_assigned, BigDecimal::from(500));
    assert_eq!(assigned[1].agreement_id, Some(second.id));
    assert_eq!(assigned[1].confidence, Confidence::Heuristic);
    assert_eq!(assigned[1].amount_assigned, BigDecimal::from(200));

    // No amount is fabricated or double-counted
    assert!(report.assigned_total() <= report.total_amount);

    let first_balance = store.get_agreement_sync(first.id).unwrap().balance;
    let second_balance = store.get_agreement_sync(second.id).unwrap().balance;
    assert_eq!(first_balance, BigDecimal::from(-500));
    assert_eq!(second_balance, BigDecimal::from(-200));
}

#[tokio::test]
async fn fine_batch_assigns_by_plate_over_csv_input() {
    let (store, _, second) = seeded_store();
    let mut session = ImportSession::with_options(store.clone(), options());

    let input = "fine_ref,violation_date,fine_amount,license_plate,category\n\
                 FIN-1,18/05/2024,90.00,ef 456 gh,speeding\n\
                 FIN-2,2024-05-19,45.50,ZZ-000-ZZ,parking\n";

    let report = session
        .run_reader(RecordType::Fine, input.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.valid_rows, 2);
    assert_eq!(report.assigned().count(), 1);
    assert_eq!(report.unassigned().count(), 1);

    let balance = store.get_agreement_sync(second.id).unwrap().balance;
    assert_eq!(balance, BigDecimal::from(90));

    // The unassigned fine is imported and waits for manual resolution
    assert!(store.get_record("FIN-2").is_some());
}

#[tokio::test]
async fn resubmitting_a_batch_applies_each_record_once() {
    let (store, first, _) = seeded_store();

    let rows = || vec![payment_row("TXN-9", "2024-05-01", "250.00", "AGR-1001", "")];

    let mut session = ImportSession::with_options(store.clone(), options());
    let first_report = session
        .run(RecordType::Payment, &payment_headers(), rows())
        .await
        .unwrap();
    assert_eq!(first_report.status, BatchStatus::Completed);

    // A second operator re-imports the same export file
    let mut second_session = ImportSession::with_options(store.clone(), options());
    let second_report = second_session
        .run(RecordType::Payment, &payment_headers(), rows())
        .await
        .unwrap();
    assert_eq!(second_report.status, BatchStatus::Completed);
    assert_eq!(second_report.assigned().count(), 1);

    // The balance reflects the payment exactly once
    let balance = store.get_agreement_sync(first.id).unwrap().balance;
    assert_eq!(balance, BigDecimal::from(-250));
}

/// Record store wrapper that fails persistence for chosen references
#[derive(Clone)]
struct FailingStore {
    inner: MemoryStore,
    fail_refs: HashSet<String>,
}

impl FailingStore {
    fn failing_on(inner: MemoryStore, refs: &[&str]) -> Self {
        Self {
            inner,
            fail_refs: refs.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[async_trait]
impl AgreementStore for FailingStore {
    async fn find_agreements(&self, filter: &AgreementFilter) -> ImportResult<Vec<Agreement>> {
        self.inner.find_agreements(filter).await
    }

    async fn get_agreement(&self, agreement_id: Uuid) -> ImportResult<Option<Agreement>> {
        self.inner.get_agreement(agreement_id).await
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert_financial_record(&mut self, record: &FinancialRecord) -> ImportResult<()> {
        if self.fail_refs.contains(&record.external_ref) {
            return Err(ImportError::Storage("connection reset".to_string()));
        }
        self.inner.insert_financial_record(record).await
    }

    async fn update_agreement_balance(
        &mut self,
        agreement_id: Uuid,
        delta: &BigDecimal,
        dedup_key: &DedupKey,
    ) -> ImportResult<BalanceUpdate> {
        self.inner
            .update_agreement_balance(agreement_id, delta, dedup_key)
            .await
    }

    async fn assignment_applied(&self, dedup_key: &DedupKey) -> ImportResult<bool> {
        self.inner.assignment_applied(dedup_key).await
    }
}

#[tokio::test]
async fn persistence_failure_marks_the_row_and_the_batch_continues() {
    let (memory, first, _) = seeded_store();
    let store = FailingStore::failing_on(memory.clone(), &["TXN-2"]);
    let mut session = ImportSession::with_options(store, options());

    let rows = vec![
        payment_row("TXN-1", "2024-05-01", "100.00", "AGR-1001", ""),
        payment_row("TXN-2", "2024-05-02", "50.00", "AGR-1001", ""),
        payment_row("TXN-3", "2024-05-03", "25.00", "AGR-1001", ""),
    ];

    let report = session
        .run(RecordType::Payment, &payment_headers(), rows)
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::PartiallyCompleted);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].external_ref, "TXN-2");
    assert_eq!(report.failures[0].row_index, 2);

    // Rows after the failure were still processed
    assert_eq!(report.assigned().count(), 2);
    let balance = memory.get_agreement_sync(first.id).unwrap().balance;
    assert_eq!(balance, BigDecimal::from(-125));

    // The failed row's payload feeds an explicit retry batch
    let retry_rows = report.failed_rows();
    assert_eq!(retry_rows.len(), 1);
    assert_eq!(retry_rows[0].get("payment_ref"), Some("TXN-2"));

    let mut retry_session = ImportSession::with_options(memory.clone(), options());
    let retry_report = retry_session
        .run(RecordType::Payment, &payment_headers(), retry_rows)
        .await
        .unwrap();
    assert_eq!(retry_report.status, BatchStatus::Completed);

    let balance = memory.get_agreement_sync(first.id).unwrap().balance;
    assert_eq!(balance, BigDecimal::from(-175));
}

#[tokio::test]
async fn report_serializes_for_the_calling_layer() {
    let (store, _, _) = seeded_store();
    let mut session = ImportSession::with_options(store, options());

    let rows = vec![payment_row("TXN-1", "2024-05-01", "100.00", "AGR-1001", "")];
    let report = session
        .run(RecordType::Payment, &payment_headers(), rows)
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "Completed");
    assert_eq!(json["valid_rows"], 1);
    assert_eq!(json["assignments"][0]["confidence"], "Exact");
}
