//! The intake task and the worker pool.
//!
//! Intake reads attestations from a stream, drops those no route matches and pushes the rest
//! onto a bounded queue. A fixed number of workers pull from the queue and hand each item to the
//! [`Dispatcher`]. When the queue is full intake waits, which in turn backs up the stream.

use std::sync::Arc;

use futures::{stream, Stream, StreamExt};
use kanal::AsyncReceiver;
use relayer_primitives::{
    attestation::Attestation,
    route::{Route, RouteTable},
};
use tokio::{task::JoinSet, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{config::RelayConfig, dispatcher::Dispatcher, filter, stats::RelayStats};

enum Job {
    Relay {
        attestation: Attestation,
        route: Route,
    },
    Stop,
}

/// Runs attestations through the filter and dispatches them on a worker pool.
#[derive(Debug)]
pub struct Relayer {
    routes: Arc<RouteTable>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<RelayStats>,
    cfg: RelayConfig,
}

impl Relayer {
    /// Creates a relayer. Nothing runs until [`Self::run`] is called.
    pub fn new(routes: Arc<RouteTable>, dispatcher: Arc<Dispatcher>, cfg: RelayConfig) -> Self {
        Self {
            routes,
            dispatcher,
            stats: Arc::new(RelayStats::new()),
            cfg,
        }
    }

    /// Counters shared with the running pipeline.
    pub fn stats(&self) -> Arc<RelayStats> {
        self.stats.clone()
    }

    /// Relays `recovered` first and then everything `source` yields.
    ///
    /// Returns once `source` ends and the queue has drained, or once `cancel` fires and every
    /// worker has finished its current item. In the latter case workers get at most
    /// `shutdown_timeout`; anything still running is abandoned and its record stays in flight.
    /// Queued items that no worker picked up are dropped.
    pub async fn run<S>(&self, recovered: Vec<Attestation>, source: S, cancel: CancellationToken)
    where
        S: Stream<Item = Attestation> + Send + Unpin,
    {
        let concurrency = self.cfg.concurrency.max(1);
        let (queue, jobs) = kanal::bounded_async(self.cfg.queue_capacity.max(1));

        let mut workers = JoinSet::new();
        for worker in 0..concurrency {
            workers.spawn(work(
                worker,
                jobs.clone(),
                self.dispatcher.clone(),
                self.stats.clone(),
                cancel.clone(),
            ));
        }
        drop(jobs);
        info!(%concurrency, routes = self.routes.len(), recovered = recovered.len(), "relay pipeline started");

        let mut source = stream::iter(recovered)
            .map(|attestation| (attestation, true))
            .chain(source.map(|attestation| (attestation, false)));
        let source_ended = loop {
            let (attestation, was_recovered) = tokio::select! {
                biased;
                _ = cancel.cancelled() => break false,
                next = source.next() => match next {
                    Some(item) => item,
                    None => break true,
                },
            };

            self.stats.note_received();
            let Some(route) = filter::is_relevant(&attestation, &self.routes) else {
                self.stats.note_no_route();
                if was_recovered {
                    warn!(
                        emitter_chain = %attestation.emitter_chain(),
                        emitter = %attestation.emitter(),
                        sequence = attestation.sequence(),
                        "recovered attestation no longer has a route, shelving it"
                    );
                    self.dispatcher.shelve(&attestation).await;
                } else {
                    debug!(
                        emitter_chain = %attestation.emitter_chain(),
                        emitter = %attestation.emitter(),
                        sequence = attestation.sequence(),
                        "no route for attestation"
                    );
                }
                continue;
            };

            let job = Job::Relay {
                route: route.clone(),
                attestation,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break false,
                sent = queue.send(job) => if sent.is_err() {
                    error!("work queue closed unexpectedly");
                    break false;
                },
            }
        };

        if source_ended {
            info!("attestation source ended, draining queue");
            // stop markers queue up behind pending work
            for _ in 0..concurrency {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = queue.send(Job::Stop) => if sent.is_err() { break },
                }
            }
        }
        drop(queue);

        let shutdown_timeout = self.cfg.shutdown_timeout;
        let drain = async {
            while let Some(res) = workers.join_next().await {
                if let Err(err) = res {
                    error!(%err, "relay worker ended abnormally");
                }
            }
        };
        tokio::pin!(drain);

        tokio::select! {
            _ = &mut drain => {}
            _ = cancel.cancelled() => {
                info!(timeout = ?shutdown_timeout, "waiting for workers to finish");
                if timeout(shutdown_timeout, &mut drain).await.is_err() {
                    warn!("workers did not finish in time, abandoning in-flight attestations");
                }
            }
        }

        info!(stats = %self.stats.snapshot(), "relay pipeline stopped");
    }
}

async fn work(
    worker: usize,
    jobs: AsyncReceiver<Job>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<RelayStats>,
    cancel: CancellationToken,
) {
    debug!(%worker, "relay worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = jobs.recv() => job,
        };

        match job {
            Ok(Job::Relay { attestation, route }) => {
                let disposition = dispatcher.dispatch(&attestation, &route).await;
                stats.record(&disposition);
            }
            Ok(Job::Stop) | Err(_) => break,
        }
    }

    debug!(%worker, "relay worker stopped");
}
