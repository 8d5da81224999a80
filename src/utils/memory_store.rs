//! In-memory store implementation for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// In-memory agreement and record store
///
/// Clones share the same underlying maps, so a test can keep a handle to
/// the store it handed to a session. Balance updates take the write locks
/// for the whole check-and-apply, which is this store's serialization
/// point for concurrent sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    agreements: Arc<RwLock<HashMap<Uuid, Agreement>>>,
    records: Arc<RwLock<HashMap<String, FinancialRecord>>>,
    applied: Arc<RwLock<HashSet<DedupKey>>>,
}

impl MemoryStore {
    /// Create a new, empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an agreement (tests and development only; the import subsystem
    /// itself never creates agreements)
    pub fn insert_agreement(&self, agreement: Agreement) {
        self.agreements
            .write()
            .unwrap()
            .insert(agreement.id, agreement);
    }

    /// Synchronous agreement lookup for test assertions
    pub fn get_agreement_sync(&self, agreement_id: Uuid) -> Option<Agreement> {
        self.agreements.read().unwrap().get(&agreement_id).cloned()
    }

    /// Look up a stored financial record by external reference
    pub fn get_record(&self, external_ref: &str) -> Option<FinancialRecord> {
        self.records.read().unwrap().get(external_ref).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.agreements.write().unwrap().clear();
        self.records.write().unwrap().clear();
        self.applied.write().unwrap().clear();
    }
}

#[async_trait]
impl AgreementStore for MemoryStore {
    async fn find_agreements(&self, filter: &AgreementFilter) -> ImportResult<Vec<Agreement>> {
        let agreements = self.agreements.read().unwrap();
        Ok(agreements
            .values()
            .filter(|agreement| filter.matches(agreement))
            .cloned()
            .collect())
    }

    async fn get_agreement(&self, agreement_id: Uuid) -> ImportResult<Option<Agreement>> {
        Ok(self.agreements.read().unwrap().get(&agreement_id).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_financial_record(&mut self, record: &FinancialRecord) -> ImportResult<()> {
        self.records
            .write()
            .unwrap()
            .insert(record.external_ref.clone(), record.clone());
        Ok(())
    }

    async fn update_agreement_balance(
        &mut self,
        agreement_id: Uuid,
        delta: &BigDecimal,
        dedup_key: &DedupKey,
    ) -> ImportResult<BalanceUpdate> {
        // Hold both locks across the check and the write so the dedup key
        // and the balance move together.
        let mut applied = self.applied.write().unwrap();
        let mut agreements = self.agreements.write().unwrap();

        let agreement = agreements
            .get_mut(&agreement_id)
            .ok_or(ImportError::AgreementNotFound(agreement_id))?;

        if applied.contains(dedup_key) {
            return Ok(BalanceUpdate {
                agreement_id,
                previous_balance: agreement.balance.clone(),
                new_balance: agreement.balance.clone(),
                applied: false,
            });
        }

        let previous_balance = agreement.balance.clone();
        agreement.balance += delta;
        applied.insert(dedup_key.clone());

        Ok(BalanceUpdate {
            agreement_id,
            previous_balance,
            new_balance: agreement.balance.clone(),
            applied: true,
        })
    }

    async fn assignment_applied(&self, dedup_key: &DedupKey) -> ImportResult<bool> {
        Ok(self.applied.read().unwrap().contains(dedup_key))
    }
}
