//! Import session orchestration
//!
//! One session processes one batch: rows stream through validation,
//! normalization, matching, and balance application, strictly in file
//! order, and every per-row outcome lands in the batch report. Only a
//! structural problem (bad header set, unreadable input) aborts a batch;
//! a partially-completed batch is a normal terminal state.

use std::collections::HashSet;
use std::io::Read;

use tracing::{info, warn};
use uuid::Uuid;

use crate::assign::{balance, matcher};
use crate::import::{normalize, reader, validate};
use crate::traits::{AgreementFilter, AgreementStore, NoopProgress, ProgressObserver, RecordStore};
use crate::types::*;

/// Orchestrator for one or more import batches over a store
///
/// Session state (options, observer) is explicit and scoped to the value;
/// nothing global survives a batch beyond what the store persisted.
pub struct ImportSession<S> {
    store: S,
    options: ImportOptions,
    observer: Box<dyn ProgressObserver>,
}

impl<S: AgreementStore + RecordStore> ImportSession<S> {
    /// Create a session with default options and no progress reporting
    pub fn new(store: S) -> Self {
        Self {
            store,
            options: ImportOptions::default(),
            observer: Box::new(NoopProgress),
        }
    }

    /// Create a session with explicit options
    pub fn with_options(store: S, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            observer: Box::new(NoopProgress),
        }
    }

    /// Attach a progress observer, replacing the default no-op one
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Process one batch of rows
    ///
    /// The header set is checked first; a missing required column rejects
    /// the whole batch before any row runs. After that the session never
    /// returns an error: every per-row problem is recorded in the report
    /// and processing continues with the next row.
    pub async fn run(
        &mut self,
        record_type: RecordType,
        headers: &[String],
        rows: Vec<RawRow>,
    ) -> ImportResult<BatchReport> {
        validate::validate_headers(headers, record_type)?;

        let batch_id = Uuid::new_v4();
        let mut report = BatchReport::new(batch_id, record_type);
        let mut seen_refs: HashSet<String> = HashSet::new();

        info!(
            %batch_id,
            record_type = record_type.as_str(),
            rows = rows.len(),
            "import batch started"
        );

        for (position, row) in rows.into_iter().enumerate() {
            let row_index = position + 1;
            report.total_rows += 1;
            let outcome = self
                .process_row(&row, row_index, record_type, &mut seen_refs, &mut report)
                .await;
            self.observer.on_row(row_index, &outcome);
        }

        report.status = if report.issues.is_empty() && report.failures.is_empty() {
            BatchStatus::Completed
        } else {
            BatchStatus::PartiallyCompleted
        };

        info!(
            %batch_id,
            status = ?report.status,
            valid = report.valid_rows,
            invalid = report.invalid_rows,
            failed = report.failures.len(),
            "import batch finished"
        );

        Ok(report)
    }

    /// Read delimited text and process it as one batch
    pub async fn run_reader<R: Read>(
        &mut self,
        record_type: RecordType,
        input: R,
    ) -> ImportResult<BatchReport> {
        let batch = reader::parse_delimited(input)?;
        self.run(record_type, &batch.headers, batch.rows).await
    }

    async fn process_row(
        &mut self,
        row: &RawRow,
        row_index: usize,
        record_type: RecordType,
        seen_refs: &mut HashSet<String>,
        report: &mut BatchReport,
    ) -> RowOutcome {
        if let Err(issue) = validate::validate_row(row, row_index, record_type, &self.options) {
            return Self::reject(report, issue);
        }

        let record = match normalize::normalize(row, row_index, record_type) {
            Ok(record) => record,
            Err(issue) => return Self::reject(report, issue),
        };

        // At most one assignment per external reference per batch; a
        // repeated reference is an operator error in the export, not a
        // record to silently double-import.
        if !seen_refs.insert(record.external_ref.clone()) {
            let issue = ImportIssue::new(
                row_index,
                record_type.reference_column(),
                format!(
                    "duplicate external reference '{}' in batch",
                    record.external_ref
                ),
            );
            return Self::reject(report, issue);
        }

        report.valid_rows += 1;
        report.total_amount += &record.amount;

        let candidates = match self.candidates_for(&record).await {
            Ok(candidates) => candidates,
            Err(err) => return Self::fail(report, row_index, row, &record.external_ref, err),
        };

        let assignment = matcher::assign(&record, &candidates);

        if let Some(agreement_id) = assignment.agreement_id {
            match balance::apply_assignment(&mut self.store, &assignment).await {
                Ok(_update) => {
                    let outcome = RowOutcome::Assigned {
                        external_ref: record.external_ref.clone(),
                        agreement_id,
                        confidence: assignment.confidence,
                    };
                    report.assignments.push(assignment);
                    outcome
                }
                Err(err) => Self::fail(report, row_index, row, &record.external_ref, err),
            }
        } else {
            // Unassigned records are still imported; they wait for manual
            // assignment with no balance effect.
            match self.store.insert_financial_record(&record).await {
                Ok(()) => {
                    warn!(
                        row = row_index,
                        external_ref = %record.external_ref,
                        "no unambiguous agreement match, record left unassigned"
                    );
                    let outcome = RowOutcome::Unassigned {
                        external_ref: record.external_ref.clone(),
                    };
                    report.assignments.push(assignment);
                    outcome
                }
                Err(err) => Self::fail(report, row_index, row, &record.external_ref, err),
            }
        }
    }

    async fn candidates_for(&self, record: &FinancialRecord) -> ImportResult<Vec<Agreement>> {
        let mut candidates = Vec::new();

        if let Some(reference) = record.agreement_ref() {
            let filter = AgreementFilter::by_reference(reference);
            candidates.extend(self.store.find_agreements(&filter).await?);
        }
        if let Some(plate) = record.license_plate() {
            let filter = AgreementFilter::by_license_plate(plate, record.occurred_on);
            candidates.extend(self.store.find_agreements(&filter).await?);
        }
        if let Some(name) = record.customer_name() {
            let filter = AgreementFilter::by_customer_name(name, record.occurred_on);
            candidates.extend(self.store.find_agreements(&filter).await?);
        }

        let mut seen = HashSet::new();
        candidates.retain(|agreement| seen.insert(agreement.id));
        Ok(candidates)
    }

    fn reject(report: &mut BatchReport, issue: ImportIssue) -> RowOutcome {
        warn!(row = issue.row_index, field = %issue.field, "row rejected: {}", issue.message);
        report.invalid_rows += 1;
        report.issues.push(issue.clone());
        RowOutcome::Rejected { issue }
    }

    fn fail(
        report: &mut BatchReport,
        row_index: usize,
        row: &RawRow,
        external_ref: &str,
        err: ImportError,
    ) -> RowOutcome {
        let reason = err.to_string();
        warn!(row = row_index, external_ref, "row failed to persist: {reason}");
        report.failures.push(PersistenceFailure {
            row_index,
            external_ref: external_ref.to_string(),
            reason: reason.clone(),
            raw: row.clone(),
        });
        RowOutcome::Failed {
            external_ref: external_ref.to_string(),
            reason,
        }
    }
}
