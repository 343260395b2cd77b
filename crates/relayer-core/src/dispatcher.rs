//! Claims an attestation, relays it and records the result.

use std::sync::Arc;

use chain_clients::registry::ClientRegistry;
use relayer_db::ledger::ProcessingLedger;
use relayer_primitives::{attestation::Attestation, outcome::Outcome, route::Route};
use tracing::{debug, error, info, warn};

use crate::controller::RetryController;

/// What happened to an attestation handed to the [`Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The controller ran and its outcome was committed.
    Dispatched(Outcome),

    /// Another worker owns the attestation, or it is already final.
    AlreadyProcessing,

    /// No client is registered for the route's destination.
    NoClient,

    /// The ledger could not be read or written. Any claimed record stays in flight until the next
    /// restart.
    LedgerError,
}

/// Connects the ledger, the clients and the controller.
#[derive(Debug)]
pub struct Dispatcher {
    ledger: Arc<dyn ProcessingLedger>,
    clients: Arc<ClientRegistry>,
    controller: RetryController,
}

impl Dispatcher {
    /// Creates a new dispatcher.
    pub const fn new(
        ledger: Arc<dyn ProcessingLedger>,
        clients: Arc<ClientRegistry>,
        controller: RetryController,
    ) -> Self {
        Self {
            ledger,
            clients,
            controller,
        }
    }

    /// Relays `attestation` along `route` unless someone else already did or is doing so.
    ///
    /// Errors are logged and reported through the returned [`Disposition`]; they never propagate.
    pub async fn dispatch(&self, attestation: &Attestation, route: &Route) -> Disposition {
        let direction = route.direction();
        let id = attestation.id();

        let Some(client) = self.clients.get(route.destination_chain) else {
            error!(
                %direction,
                emitter_chain = %id.emitter_chain,
                emitter = %id.emitter,
                sequence = id.sequence,
                "no chain client for destination"
            );
            return Disposition::NoClient;
        };

        match self.ledger.try_begin(attestation).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    %direction,
                    emitter_chain = %id.emitter_chain,
                    emitter = %id.emitter,
                    sequence = id.sequence,
                    "attestation already processed or in flight"
                );
                return Disposition::AlreadyProcessing;
            }
            Err(err) => {
                error!(
                    %direction,
                    emitter_chain = %id.emitter_chain,
                    emitter = %id.emitter,
                    sequence = id.sequence,
                    %err,
                    "could not claim attestation"
                );
                return Disposition::LedgerError;
            }
        }

        info!(
            %direction,
            emitter_chain = %id.emitter_chain,
            emitter = %id.emitter,
            sequence = id.sequence,
            target = %route.target,
            "relaying attestation"
        );
        let outcome = self
            .controller
            .execute(client.as_ref(), route, attestation)
            .await;

        if let Err(err) = self.ledger.commit(&id, &outcome).await {
            error!(
                %direction,
                emitter_chain = %id.emitter_chain,
                emitter = %id.emitter,
                sequence = id.sequence,
                %outcome,
                %err,
                "could not record outcome, record stays in flight"
            );
            return Disposition::LedgerError;
        }

        if outcome.is_confirmed() {
            info!(
                %direction,
                emitter_chain = %id.emitter_chain,
                emitter = %id.emitter,
                sequence = id.sequence,
                %outcome,
                "attestation relayed"
            );
        } else {
            warn!(
                %direction,
                emitter_chain = %id.emitter_chain,
                emitter = %id.emitter,
                sequence = id.sequence,
                %outcome,
                "attestation not relayed"
            );
        }

        Disposition::Dispatched(outcome)
    }

    /// Takes a recovered attestation whose route no longer exists out of the recovery set.
    ///
    /// The record is closed as a retryable failure without any submission, so a redelivery can
    /// still claim it once a route is configured again.
    pub async fn shelve(&self, attestation: &Attestation) {
        let id = attestation.id();

        match self.ledger.try_begin(attestation).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                error!(
                    emitter_chain = %id.emitter_chain,
                    emitter = %id.emitter,
                    sequence = id.sequence,
                    %err,
                    "could not claim unroutable attestation"
                );
                return;
            }
        }

        let outcome = Outcome::Failed {
            error: "no route configured".to_string(),
            attempts: 0,
            retryable: true,
        };
        if let Err(err) = self.ledger.commit(&id, &outcome).await {
            error!(
                emitter_chain = %id.emitter_chain,
                emitter = %id.emitter,
                sequence = id.sequence,
                %err,
                "could not shelve unroutable attestation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chain_clients::{client::ChainClient, errors::SubmitError};
    use chrono::{DateTime, Utc};
    use relayer_db::{
        errors::{DbError, DbResult},
        inmemory::InMemoryLedger,
        record::{ProcessingRecord, ProcessingStatus},
    };
    use relayer_primitives::{
        attestation::AttestationId,
        chain::ChainId,
        outcome::TxId,
    };
    use relayer_retry::Backoff;
    use relayer_test_utils::{
        client::ScriptedClient,
        fixtures::{route, AttestationBuilder},
        logs::capture_logs,
    };
    use tracing::Level;

    use super::*;
    use crate::config::ControllerConfig;

    fn controller() -> RetryController {
        RetryController::new(ControllerConfig {
            max_attempts: 2,
            backoff: Backoff {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(10),
                multiplier: 1.0,
            },
            submission_timeout: Duration::from_secs(1),
        })
    }

    fn setup(
        client: ScriptedClient,
        ledger: Arc<dyn ProcessingLedger>,
    ) -> (Dispatcher, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let mut registry = ClientRegistry::new();
        registry
            .register(client.clone() as Arc<dyn ChainClient>)
            .unwrap();

        (
            Dispatcher::new(ledger, Arc::new(registry), controller()),
            client,
        )
    }

    fn to_arbitrum(sequence: u64) -> (Route, Attestation) {
        let route = route(ChainId::AZTEC, 0x01, ChainId::ARBITRUM_SEPOLIA, "0xaa");
        let att = AttestationBuilder::new()
            .emitter_chain(ChainId::AZTEC)
            .emitter_byte(0x01)
            .sequence(sequence)
            .build();
        (route, att)
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_dispatch_is_committed_and_never_repeated() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, client) = setup(
            ScriptedClient::new(ChainId::ARBITRUM_SEPOLIA),
            ledger.clone(),
        );
        let (route, att) = to_arbitrum(1);

        let first = dispatcher.dispatch(&att, &route).await;
        assert_eq!(
            first,
            Disposition::Dispatched(Outcome::Confirmed {
                tx_id: TxId::new("0xscripted"),
                attempts: 1
            })
        );

        let record = ledger.get(&att.id()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Confirmed);
        assert_eq!(record.destination_tx, Some(TxId::new("0xscripted")));

        assert_eq!(
            dispatcher.dispatch(&att, &route).await,
            Disposition::AlreadyProcessing
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redelivery_while_in_flight_is_skipped_quietly() {
        let (logs, _guard) = capture_logs();
        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, client) = setup(
            ScriptedClient::new(ChainId::ARBITRUM_SEPOLIA).with_delay(Duration::from_secs(1)),
            ledger.clone(),
        );
        let (route, att) = to_arbitrum(6);

        let redelivered = async {
            // the first submission is still waiting on the client at this point
            tokio::time::sleep(Duration::from_millis(100)).await;
            let in_flight = ledger.get(&att.id()).await.unwrap().unwrap();
            assert_eq!(in_flight.status, ProcessingStatus::InFlight);
            dispatcher.dispatch(&att, &route).await
        };
        let (first, second) = tokio::join!(dispatcher.dispatch(&att, &route), redelivered);

        assert!(matches!(first, Disposition::Dispatched(ref o) if o.is_confirmed()));
        assert_eq!(second, Disposition::AlreadyProcessing);
        assert_eq!(client.call_count(), 1);

        let record = ledger.get(&att.id()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Confirmed);
        assert_eq!(record.attempts, 1);

        let skipped = logs.with_message("attestation already processed or in flight");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].level, Level::DEBUG);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_dispatch_can_be_retried_on_redelivery() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, client) = setup(
            ScriptedClient::new(ChainId::ARBITRUM_SEPOLIA).primary([
                Err(SubmitError::Transient("down".to_string())),
                Err(SubmitError::Transient("down".to_string())),
            ]),
            ledger.clone(),
        );
        let (route, att) = to_arbitrum(2);

        let first = dispatcher.dispatch(&att, &route).await;
        assert!(matches!(
            first,
            Disposition::Dispatched(Outcome::Failed {
                retryable: true,
                attempts: 2,
                ..
            })
        ));

        let second = dispatcher.dispatch(&att, &route).await;
        assert!(matches!(second, Disposition::Dispatched(ref o) if o.is_confirmed()));

        let record = ledger.get(&att.id()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Confirmed);
        assert_eq!(record.attempts, 3);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_dispatch_is_final() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, client) = setup(
            ScriptedClient::new(ChainId::ARBITRUM_SEPOLIA)
                .primary([Err(SubmitError::Permanent("reverted".to_string()))]),
            ledger.clone(),
        );
        let (route, att) = to_arbitrum(3);

        assert!(matches!(
            dispatcher.dispatch(&att, &route).await,
            Disposition::Dispatched(Outcome::Failed {
                retryable: false,
                ..
            })
        ));
        assert_eq!(
            dispatcher.dispatch(&att, &route).await,
            Disposition::AlreadyProcessing
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_client_leaves_the_ledger_alone() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (dispatcher, client) = setup(ScriptedClient::new(ChainId::BASE), ledger.clone());
        let (route, att) = to_arbitrum(4);

        assert_eq!(dispatcher.dispatch(&att, &route).await, Disposition::NoClient);
        assert!(ledger.get(&att.id()).await.unwrap().is_none());
        assert_eq!(client.call_count(), 0);
    }

    /// Claims everything and then refuses to record anything.
    #[derive(Debug, Default)]
    struct ForgetfulLedger;

    #[async_trait]
    impl ProcessingLedger for ForgetfulLedger {
        async fn try_begin(&self, _attestation: &Attestation) -> DbResult<bool> {
            Ok(true)
        }

        async fn commit(&self, id: &AttestationId, _outcome: &Outcome) -> DbResult<()> {
            Err(DbError::NotInFlight {
                id: *id,
                found: None,
            })
        }

        async fn get(&self, _id: &AttestationId) -> DbResult<Option<ProcessingRecord>> {
            Ok(None)
        }

        async fn recover_in_flight(&self) -> DbResult<Vec<ProcessingRecord>> {
            Ok(Vec::new())
        }

        async fn prune(&self, _older_than: DateTime<Utc>) -> DbResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn commit_failures_are_reported_not_raised() {
        let (dispatcher, client) = setup(
            ScriptedClient::new(ChainId::ARBITRUM_SEPOLIA),
            Arc::new(ForgetfulLedger),
        );
        let (route, att) = to_arbitrum(5);

        assert_eq!(
            dispatcher.dispatch(&att, &route).await,
            Disposition::LedgerError
        );
        assert_eq!(client.call_count(), 1);
    }
}
