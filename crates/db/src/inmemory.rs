//! In-memory ledger for tests and development.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relayer_primitives::{
    attestation::{Attestation, AttestationId},
    outcome::Outcome,
};
use tokio::sync::RwLock;

use crate::{
    errors::{DbError, DbResult},
    ledger::ProcessingLedger,
    record::{ProcessingRecord, ProcessingStatus},
};

/// [`ProcessingLedger`] backed by a map. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    records: Arc<RwLock<HashMap<AttestationId, ProcessingRecord>>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessingLedger for InMemoryLedger {
    async fn try_begin(&self, attestation: &Attestation) -> DbResult<bool> {
        let mut records = self.records.write().await;
        let now = Utc::now();

        match records.get_mut(&attestation.id()) {
            Some(record) if record.is_claimable() => {
                record.status = ProcessingStatus::InFlight;
                record.retryable = false;
                record.last_error = None;
                record.envelope = attestation.raw().to_vec();
                record.updated_at = now;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                records.insert(
                    attestation.id(),
                    ProcessingRecord {
                        id: attestation.id(),
                        status: ProcessingStatus::InFlight,
                        destination_tx: None,
                        attempts: 0,
                        last_error: None,
                        retryable: false,
                        envelope: attestation.raw().to_vec(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn commit(&self, id: &AttestationId, outcome: &Outcome) -> DbResult<()> {
        let mut records = self.records.write().await;

        let record = match records.get_mut(id) {
            Some(record) if record.status == ProcessingStatus::InFlight => record,
            other => {
                return Err(DbError::NotInFlight {
                    id: *id,
                    found: other.map(|r| r.status),
                })
            }
        };

        record.attempts = record.attempts.saturating_add(outcome.attempts());
        record.updated_at = Utc::now();
        match outcome {
            Outcome::Confirmed { tx_id, .. } => {
                record.status = ProcessingStatus::Confirmed;
                record.destination_tx = Some(tx_id.clone());
                record.retryable = false;
            }
            Outcome::Failed {
                error, retryable, ..
            } => {
                record.status = ProcessingStatus::FailedPermanent;
                record.last_error = Some(error.clone());
                record.retryable = *retryable;
            }
        }

        Ok(())
    }

    async fn get(&self, id: &AttestationId) -> DbResult<Option<ProcessingRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn recover_in_flight(&self) -> DbResult<Vec<ProcessingRecord>> {
        let mut records = self.records.write().await;
        let now = Utc::now();

        let mut pending: Vec<_> = records
            .values_mut()
            .filter_map(|record| {
                if record.status == ProcessingStatus::InFlight {
                    record.status = ProcessingStatus::Pending;
                    record.updated_at = now;
                }
                (record.status == ProcessingStatus::Pending).then(|| record.clone())
            })
            .collect();
        pending.sort_by_key(|r| r.created_at);

        Ok(pending)
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> DbResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !(r.status.is_terminal() && r.updated_at < older_than));

        Ok((before - records.len()) as u64)
    }
}
