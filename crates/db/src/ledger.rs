//! The ledger interface shared by all storage backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relayer_primitives::{
    attestation::{Attestation, AttestationId},
    outcome::Outcome,
};

use crate::{errors::DbResult, record::ProcessingRecord};

/// Tracks the processing state of every attestation the relayer has claimed.
///
/// Implementations must make [`Self::try_begin`] atomic: of any number of concurrent callers for
/// the same identity, at most one observes `true`.
#[async_trait]
pub trait ProcessingLedger: std::fmt::Debug + Send + Sync {
    /// Claims the attestation for dispatch.
    ///
    /// Succeeds when no record exists, the record is pending, or it failed with the retryable
    /// flag set. Returns `false` if the record is in flight, confirmed or failed for good.
    async fn try_begin(&self, attestation: &Attestation) -> DbResult<bool>;

    /// Records the result of a dispatch on an in-flight record.
    ///
    /// The outcome's attempt count is added to the record's running total.
    async fn commit(&self, id: &AttestationId, outcome: &Outcome) -> DbResult<()>;

    /// Fetches a single record.
    async fn get(&self, id: &AttestationId) -> DbResult<Option<ProcessingRecord>>;

    /// Returns every in-flight record to pending and yields all pending records, oldest first.
    ///
    /// Only meant to be called at startup, before any worker runs.
    async fn recover_in_flight(&self) -> DbResult<Vec<ProcessingRecord>>;

    /// Deletes terminal records last updated before `older_than`. Returns the number removed.
    async fn prune(&self, older_than: DateTime<Utc>) -> DbResult<u64>;
}

/// Behavior every [`ProcessingLedger`] implementation must exhibit.
#[cfg(test)]
pub(crate) mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::future::join_all;
    use relayer_primitives::{chain::ChainId, outcome::TxId};
    use relayer_test_utils::fixtures::AttestationBuilder;

    use super::*;
    use crate::{errors::DbError, record::ProcessingStatus};

    fn attestation(sequence: u64) -> Attestation {
        AttestationBuilder::new()
            .emitter_chain(ChainId::ARBITRUM_SEPOLIA)
            .emitter_byte(0x11)
            .sequence(sequence)
            .build()
    }

    fn confirmed(attempts: u32) -> Outcome {
        Outcome::Confirmed {
            tx_id: TxId::new("0xfeed"),
            attempts,
        }
    }

    fn failed(attempts: u32, retryable: bool) -> Outcome {
        Outcome::Failed {
            error: "boom".to_string(),
            attempts,
            retryable,
        }
    }

    pub(crate) async fn lifecycle(ledger: &impl ProcessingLedger) {
        let att = attestation(1);
        let id = att.id();

        assert!(ledger.get(&id).await.unwrap().is_none());
        assert!(ledger.try_begin(&att).await.unwrap());
        assert!(!ledger.try_begin(&att).await.unwrap(), "in flight");

        let record = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::InFlight);
        assert_eq!(record.envelope, att.raw());
        assert_eq!(record.attempts, 0);

        ledger.commit(&id, &confirmed(2)).await.unwrap();
        let record = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Confirmed);
        assert_eq!(record.destination_tx, Some(TxId::new("0xfeed")));
        assert_eq!(record.attempts, 2);

        assert!(!ledger.try_begin(&att).await.unwrap(), "confirmed");

        let other = attestation(2);
        assert!(ledger.try_begin(&other).await.unwrap());
        ledger.commit(&other.id(), &failed(1, false)).await.unwrap();
        assert!(!ledger.try_begin(&other).await.unwrap(), "rejected");
        let record = ledger.get(&other.id()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::FailedPermanent);
        assert_eq!(record.last_error.as_deref(), Some("boom"));
        assert!(!record.retryable);
    }

    pub(crate) async fn retryable_failures_can_be_reclaimed(ledger: &impl ProcessingLedger) {
        let att = attestation(3);
        let id = att.id();

        assert!(ledger.try_begin(&att).await.unwrap());
        ledger.commit(&id, &failed(5, true)).await.unwrap();
        assert!(ledger.get(&id).await.unwrap().unwrap().retryable);

        assert!(ledger.try_begin(&att).await.unwrap());
        let record = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::InFlight);
        assert!(!record.retryable);

        ledger.commit(&id, &confirmed(1)).await.unwrap();
        let record = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Confirmed);
        assert_eq!(record.attempts, 6);
    }

    pub(crate) async fn commit_requires_in_flight(ledger: &impl ProcessingLedger) {
        let att = attestation(4);
        let id = att.id();

        assert!(matches!(
            ledger.commit(&id, &confirmed(1)).await,
            Err(DbError::NotInFlight { found: None, .. })
        ));

        assert!(ledger.try_begin(&att).await.unwrap());
        ledger.commit(&id, &confirmed(1)).await.unwrap();
        assert!(matches!(
            ledger.commit(&id, &failed(1, true)).await,
            Err(DbError::NotInFlight {
                found: Some(ProcessingStatus::Confirmed),
                ..
            })
        ));
    }

    pub(crate) async fn recovery_resets_in_flight(ledger: &impl ProcessingLedger) {
        let stuck = attestation(5);
        let done = attestation(6);

        assert!(ledger.try_begin(&stuck).await.unwrap());
        assert!(ledger.try_begin(&done).await.unwrap());
        ledger.commit(&done.id(), &confirmed(1)).await.unwrap();

        let recovered = ledger.recover_in_flight().await.unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, stuck.id());
        assert_eq!(recovered[0].status, ProcessingStatus::Pending);
        assert_eq!(recovered[0].envelope, stuck.raw());

        // the pending record can be claimed again exactly once
        assert!(ledger.try_begin(&stuck).await.unwrap());
        assert!(!ledger.try_begin(&stuck).await.unwrap());
    }

    pub(crate) async fn prune_only_removes_old_terminal_records(ledger: &impl ProcessingLedger) {
        let done = attestation(7);
        let running = attestation(8);

        assert!(ledger.try_begin(&done).await.unwrap());
        assert!(ledger.try_begin(&running).await.unwrap());
        ledger.commit(&done.id(), &confirmed(1)).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(ledger.prune(past).await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(ledger.prune(Utc::now()).await.unwrap(), 1);
        assert!(ledger.get(&done.id()).await.unwrap().is_none());
        assert!(ledger.get(&running.id()).await.unwrap().is_some());
    }

    pub(crate) async fn concurrent_try_begin_has_one_winner<L>(ledger: Arc<L>)
    where
        L: ProcessingLedger + 'static,
    {
        let att = attestation(9);

        let tasks = (0..16).map(|_| {
            let ledger = ledger.clone();
            let att = att.clone();
            tokio::spawn(async move { ledger.try_begin(&att).await.unwrap() })
        });
        let winners = join_all(tasks)
            .await
            .into_iter()
            .map(|res| res.unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }
}
