//! Drives submissions for a single attestation until it is confirmed or the budget runs out.
//!
//! Transient failures are retried on the same path after an exponential backoff. A
//! [`SubmitError::ServiceUnavailable`] moves the remaining budget to the client's secondary path
//! without waiting, once. A [`SubmitError::Permanent`] ends the dispatch immediately.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use chain_clients::{
    client::{ChainClient, SubmissionPath},
    errors::SubmitError,
};
use relayer_primitives::{
    attestation::{Attestation, AttestationId},
    outcome::Outcome,
    route::{Direction, Route},
};
use relayer_retry::{retry_with, RetryAction, Strategy};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ControllerConfig;

/// Applies the retry and failover policy to submissions.
#[derive(Debug, Clone)]
pub struct RetryController {
    cfg: ControllerConfig,
}

impl RetryController {
    /// Creates a controller with the given policy.
    pub const fn new(cfg: ControllerConfig) -> Self {
        Self { cfg }
    }

    /// Submits `attestation` to `route`'s target through `client`.
    ///
    /// Never returns an error: every way of giving up is folded into [`Outcome::Failed`], whose
    /// `retryable` flag is set only when the attempt budget ran out.
    pub async fn execute(
        &self,
        client: &dyn ChainClient,
        route: &Route,
        attestation: &Attestation,
    ) -> Outcome {
        let direction = route.direction();
        let id = attestation.id();
        let deadline = self.cfg.submission_timeout;

        let failed_over = Arc::new(AtomicBool::new(false));
        let made = AtomicU32::new(0);
        let strategy = self.strategy(
            client.has_secondary_path(),
            failed_over.clone(),
            direction,
            id,
        );

        let result = retry_with(strategy, |attempt| {
            let path = if failed_over.load(Ordering::SeqCst) {
                SubmissionPath::Secondary
            } else {
                SubmissionPath::Primary
            };
            made.fetch_add(1, Ordering::Relaxed);
            let target = &route.target;
            let payload = attestation.raw();

            async move {
                info!(
                    %direction,
                    emitter_chain = %id.emitter_chain,
                    emitter = %id.emitter,
                    sequence = id.sequence,
                    attempt = attempt + 1,
                    %path,
                    outcome = "attempting",
                    "submitting verification"
                );

                let res = match timeout(deadline, client.submit_verification(target, payload, path))
                    .await
                {
                    Ok(res) => res,
                    Err(_) => Err(SubmitError::Transient(format!(
                        "no response within {deadline:?}"
                    ))),
                };

                match &res {
                    Ok(tx_id) => info!(
                        %direction,
                        emitter_chain = %id.emitter_chain,
                        emitter = %id.emitter,
                        sequence = id.sequence,
                        attempt = attempt + 1,
                        %path,
                        outcome = "confirmed",
                        %tx_id,
                        "verification submitted"
                    ),
                    Err(err) => warn!(
                        %direction,
                        emitter_chain = %id.emitter_chain,
                        emitter = %id.emitter,
                        sequence = id.sequence,
                        attempt = attempt + 1,
                        %path,
                        outcome = err.kind(),
                        %err,
                        "submission failed"
                    ),
                }

                res
            }
        })
        .await;

        let attempts = made.load(Ordering::Relaxed);
        match result {
            Ok(tx_id) => Outcome::Confirmed { tx_id, attempts },
            Err(err) => Outcome::Failed {
                retryable: !matches!(err, SubmitError::Permanent(_)),
                error: err.to_string(),
                attempts,
            },
        }
    }

    fn strategy(
        &self,
        has_secondary: bool,
        failed_over: Arc<AtomicBool>,
        direction: Direction,
        id: AttestationId,
    ) -> Strategy<SubmitError> {
        let backoff = self.cfg.backoff;
        let max_retries = self.cfg.max_attempts.max(1) as usize - 1;

        Strategy::new(move |err: &SubmitError, attempt| match err {
            SubmitError::Permanent(_) => RetryAction::Stop,
            SubmitError::ServiceUnavailable(_)
                if has_secondary && !failed_over.swap(true, Ordering::SeqCst) =>
            {
                info!(
                    %direction,
                    emitter_chain = %id.emitter_chain,
                    emitter = %id.emitter,
                    sequence = id.sequence,
                    "primary path unavailable, failing over to secondary"
                );
                RetryAction::Retry(Duration::ZERO)
            }
            SubmitError::ServiceUnavailable(_) | SubmitError::Transient(_) => {
                RetryAction::Retry(backoff.delay(attempt))
            }
        })
        .with_max_retries(max_retries)
    }
}

#[cfg(test)]
mod tests {
    use relayer_primitives::{chain::ChainId, outcome::TxId};
    use relayer_retry::Backoff;
    use relayer_test_utils::{
        client::ScriptedClient,
        fixtures::{route, AttestationBuilder},
        logs::capture_logs,
    };
    use tokio::time::Instant;
    use tracing::Level;

    use super::*;

    fn controller(max_attempts: u32) -> RetryController {
        RetryController::new(ControllerConfig {
            max_attempts,
            backoff: Backoff {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(1),
                multiplier: 2.0,
            },
            submission_timeout: Duration::from_secs(5),
        })
    }

    fn to_aztec() -> (Route, Attestation) {
        let route = route(ChainId::ARBITRUM_SEPOLIA, 0x02, ChainId::AZTEC, "0xbeef");
        let att = AttestationBuilder::new()
            .emitter_chain(ChainId::ARBITRUM_SEPOLIA)
            .emitter_byte(0x02)
            .sequence(11)
            .build();
        (route, att)
    }

    fn transient() -> Result<TxId, SubmitError> {
        Err(SubmitError::Transient("rpc hiccup".to_string()))
    }

    fn unavailable() -> Result<TxId, SubmitError> {
        Err(SubmitError::ServiceUnavailable("503".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_is_confirmed_and_payload_is_forwarded() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC).primary([Ok(TxId::new("0x01"))]);

        let outcome = controller(3).execute(&client, &route, &att).await;

        assert_eq!(
            outcome,
            Outcome::Confirmed {
                tx_id: TxId::new("0x01"),
                attempts: 1
            }
        );
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, SubmissionPath::Primary);
        assert_eq!(calls[0].target.as_str(), "0xbeef");
        assert_eq!(calls[0].payload, att.raw());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_succeed() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC).primary([
            transient(),
            transient(),
            Ok(TxId::new("0x02")),
        ]);

        let start = Instant::now();
        let outcome = controller(5).execute(&client, &route, &att).await;
        let elapsed = start.elapsed();

        assert_eq!(
            outcome,
            Outcome::Confirmed {
                tx_id: TxId::new("0x02"),
                attempts: 3
            }
        );
        // 100ms + 200ms of backoff
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
        assert_eq!(client.calls_on(SubmissionPath::Secondary), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_budget_is_retryable() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC).otherwise(transient());

        let outcome = controller(4).execute(&client, &route, &att).await;

        match outcome {
            Outcome::Failed {
                attempts,
                retryable,
                error,
            } => {
                assert_eq!(attempts, 4);
                assert!(retryable);
                assert!(error.contains("rpc hiccup"), "{error}");
            }
            other => panic!("unexpected outcome: {other}"),
        }
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_rejection_stops_immediately() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC)
            .primary([Err(SubmitError::Permanent("already verified".to_string()))]);

        let outcome = controller(5).execute(&client, &route, &att).await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                error: "permanent: already verified".to_string(),
                attempts: 1,
                retryable: false,
            }
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_service_fails_over_without_delay() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC)
            .with_secondary()
            .primary([unavailable()])
            .secondary([Ok(TxId::new("0x03"))]);

        let start = Instant::now();
        let outcome = controller(3).execute(&client, &route, &att).await;

        assert_eq!(
            outcome,
            Outcome::Confirmed {
                tx_id: TxId::new("0x03"),
                attempts: 2
            }
        );
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(client.calls_on(SubmissionPath::Primary), 1);
        assert_eq!(client.calls_on(SubmissionPath::Secondary), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failover_happens_once_and_keeps_the_budget() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC)
            .with_secondary()
            .primary([unavailable()])
            .otherwise(unavailable());

        let outcome = controller(4).execute(&client, &route, &att).await;

        assert!(matches!(
            outcome,
            Outcome::Failed {
                attempts: 4,
                retryable: true,
                ..
            }
        ));
        // the remaining budget stays on the secondary path
        assert_eq!(client.calls_on(SubmissionPath::Primary), 1);
        assert_eq!(client.calls_on(SubmissionPath::Secondary), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_without_secondary_is_treated_as_transient() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC)
            .primary([unavailable(), Ok(TxId::new("0x04"))]);

        let start = Instant::now();
        let outcome = controller(3).execute(&client, &route, &att).await;

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.attempts(), 2);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(client.calls_on(SubmissionPath::Secondary), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_submissions_time_out_as_transient() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC).with_delay(Duration::from_secs(60));

        let outcome = controller(2).execute(&client, &route, &att).await;

        match outcome {
            Outcome::Failed {
                attempts,
                retryable,
                error,
            } => {
                assert_eq!(attempts, 2);
                assert!(retryable);
                assert!(error.starts_with("transient: no response"), "{error}");
            }
            other => panic!("unexpected outcome: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_still_submits_once() {
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC).otherwise(transient());

        let outcome = controller(0).execute(&client, &route, &att).await;

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_attempt_is_logged_before_and_after_submission() {
        let (logs, _guard) = capture_logs();
        let (route, att) = to_aztec();
        let client = ScriptedClient::new(ChainId::AZTEC)
            .with_secondary()
            .primary([unavailable()])
            .secondary([transient(), Ok(TxId::new("0x05"))]);

        let outcome = controller(5).execute(&client, &route, &att).await;

        assert!(outcome.is_confirmed());
        assert_eq!(
            logs.outcomes(),
            vec![
                "attempting",
                "service_unavailable",
                "attempting",
                "transient",
                "attempting",
                "confirmed"
            ]
        );
        let announced = logs.with_message("submitting verification");
        assert_eq!(announced.len(), 3);
        assert!(announced.iter().all(|event| event.level == Level::INFO));
    }
}
