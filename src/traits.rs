//! Traits for storage abstraction and progress reporting

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::types::*;

/// Filter for agreement lookups
///
/// All fields are optional and AND-combined. The matcher issues one lookup
/// per key it holds (reference, plate, customer) rather than one combined
/// OR query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgreementFilter {
    /// Agreement number or system id, compared exactly
    pub reference: Option<String>,
    /// Vehicle plate, compared in canonical form
    pub license_plate: Option<String>,
    /// Customer name, compared case-insensitively
    pub customer_name: Option<String>,
    /// Only agreements whose rental period contains this date
    pub active_on: Option<NaiveDate>,
    pub status: Option<AgreementStatus>,
}

impl AgreementFilter {
    pub fn by_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    pub fn by_license_plate(plate: impl Into<String>, active_on: NaiveDate) -> Self {
        Self {
            license_plate: Some(plate.into()),
            active_on: Some(active_on),
            ..Self::default()
        }
    }

    pub fn by_customer_name(name: impl Into<String>, active_on: NaiveDate) -> Self {
        Self {
            customer_name: Some(name.into()),
            active_on: Some(active_on),
            ..Self::default()
        }
    }

    /// Whether an agreement satisfies every set field of this filter
    pub fn matches(&self, agreement: &Agreement) -> bool {
        if let Some(reference) = &self.reference {
            let reference = reference.trim();
            let id_matches = reference.eq_ignore_ascii_case(&agreement.id.to_string());
            if agreement.agreement_number != reference && !id_matches {
                return false;
            }
        }
        if let Some(plate) = &self.license_plate {
            if crate::import::normalize::canonical_plate(plate)
                != crate::import::normalize::canonical_plate(&agreement.vehicle_plate)
            {
                return false;
            }
        }
        if let Some(name) = &self.customer_name {
            if !name
                .trim()
                .eq_ignore_ascii_case(agreement.customer_name.trim())
            {
                return false;
            }
        }
        if let Some(date) = self.active_on {
            if !agreement.covers(date) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if agreement.status != status {
                return false;
            }
        }
        true
    }
}

/// Read-only lookup over the application's rental agreements
///
/// The import subsystem never creates, updates, or deletes agreements
/// through this trait; balances are mutated only via [`RecordStore`].
#[async_trait]
pub trait AgreementStore: Send + Sync {
    /// Find agreements satisfying the filter
    async fn find_agreements(&self, filter: &AgreementFilter) -> ImportResult<Vec<Agreement>>;

    /// Get a single agreement by its system id
    async fn get_agreement(&self, agreement_id: Uuid) -> ImportResult<Option<Agreement>>;
}

/// Persistence for imported records and balance updates
///
/// Both operations must be atomic with respect to the dedup key: two
/// concurrent sessions applying the same `(agreement, external_ref)` must
/// result in exactly one balance mutation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a financial record; re-inserting the same `external_ref`
    /// replaces the stored record rather than duplicating it
    async fn insert_financial_record(&mut self, record: &FinancialRecord) -> ImportResult<()>;

    /// Apply `delta` to an agreement's balance unless `dedup_key` was
    /// already applied; the current balance is re-read inside the store's
    /// serialization point immediately before writing
    async fn update_agreement_balance(
        &mut self,
        agreement_id: Uuid,
        delta: &BigDecimal,
        dedup_key: &DedupKey,
    ) -> ImportResult<BalanceUpdate>;

    /// Whether a prior assignment with this dedup key has been applied
    async fn assignment_applied(&self, dedup_key: &DedupKey) -> ImportResult<bool>;
}

/// Observer of per-row progress during a batch
///
/// The session calls `on_row` after each row's outcome is final, in file
/// order. This replaces any live notification channel: callers that want
/// toast-style feedback implement this and forward events themselves.
pub trait ProgressObserver: Send + Sync {
    fn on_row(&self, row_index: usize, outcome: &RowOutcome);
}

/// Observer that ignores all progress events
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_row(&self, _row_index: usize, _outcome: &RowOutcome) {}
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for Arc<T> {
    fn on_row(&self, row_index: usize, outcome: &RowOutcome) {
        (**self).on_row(row_index, outcome)
    }
}

/// Observer that collects events for later inspection
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: std::sync::Mutex<Vec<(usize, RowOutcome)>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(usize, RowOutcome)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressObserver for CollectingProgress {
    fn on_row(&self, row_index: usize, outcome: &RowOutcome) {
        self.events.lock().unwrap().push((row_index, outcome.clone()));
    }
}
