//! A chain client driven by a script.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chain_clients::{
    client::{ChainClient, SubmissionPath},
    errors::SubmitError,
};
use relayer_primitives::{chain::ChainId, outcome::TxId, route::DestinationContext};

/// A single call made to a [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionCall {
    /// Path requested by the caller.
    pub path: SubmissionPath,
    /// Target passed by the caller.
    pub target: DestinationContext,
    /// Payload passed by the caller.
    pub payload: Vec<u8>,
}

type Script = VecDeque<Result<TxId, SubmitError>>;

/// Replays queued responses per path and records every call.
///
/// Once a path's queue is empty the fallback response is returned. The default fallback is a
/// successful submission with transaction id `0xscripted`.
#[derive(Debug)]
pub struct ScriptedClient {
    chain_id: ChainId,
    secondary: bool,
    delay: Option<Duration>,
    primary_script: Mutex<Script>,
    secondary_script: Mutex<Script>,
    fallback: Result<TxId, SubmitError>,
    calls: Mutex<Vec<SubmissionCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedClient {
    /// A client for `chain_id` without a secondary path that always succeeds.
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            secondary: false,
            delay: None,
            primary_script: Mutex::new(VecDeque::new()),
            secondary_script: Mutex::new(VecDeque::new()),
            fallback: Ok(TxId::new("0xscripted")),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Advertises a secondary path.
    pub fn with_secondary(mut self) -> Self {
        self.secondary = true;
        self
    }

    /// Sleeps for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Response used once the relevant script is exhausted.
    pub fn otherwise(mut self, response: Result<TxId, SubmitError>) -> Self {
        self.fallback = response;
        self
    }

    /// Queues responses for the primary path.
    pub fn primary(self, responses: impl IntoIterator<Item = Result<TxId, SubmitError>>) -> Self {
        lock(&self.primary_script).extend(responses);
        self
    }

    /// Queues responses for the secondary path.
    pub fn secondary(
        self,
        responses: impl IntoIterator<Item = Result<TxId, SubmitError>>,
    ) -> Self {
        lock(&self.secondary_script).extend(responses);
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<SubmissionCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls received on `path`.
    pub fn calls_on(&self, path: SubmissionPath) -> usize {
        lock(&self.calls).iter().filter(|c| c.path == path).count()
    }

    /// Total number of calls received.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl ChainClient for ScriptedClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn has_secondary_path(&self) -> bool {
        self.secondary
    }

    async fn submit_verification(
        &self,
        target: &DestinationContext,
        payload: &[u8],
        path: SubmissionPath,
    ) -> Result<TxId, SubmitError> {
        lock(&self.calls).push(SubmissionCall {
            path,
            target: target.clone(),
            payload: payload.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let script = match path {
            SubmissionPath::Primary => &self.primary_script,
            SubmissionPath::Secondary => &self.secondary_script,
        };
        let next = lock(script).pop_front();

        next.unwrap_or_else(|| self.fallback.clone())
    }
}
