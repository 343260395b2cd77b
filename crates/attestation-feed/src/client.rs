//! This module contains the top level [`AttestationFeed`] implementation.
//!
//! The feed owns a single WebSocket subscription to the guardian network. Every notification is
//! decoded and fanned out to all live [`Subscription`]s. When the connection drops the feed
//! reconnects with exponential backoff until it is closed.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use futures::StreamExt;
use jsonrpsee::{
    core::client::{Subscription as RpcSubscription, SubscriptionClientT},
    rpc_params,
    ws_client::{WsClient, WsClientBuilder},
};
use relayer_primitives::attestation::Attestation;
use relayer_retry::{retry_with, RetryAction, Strategy};
use serde::Deserialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{config::FeedConfig, errors::FeedError, subscription::Subscription};

/// Payload of a feed notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedVaaNotification {
    /// Hex-encoded attestation envelope.
    pub vaa_bytes: String,
}

/// Point-in-time view of the feed counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Attestations decoded and delivered.
    pub received: u64,

    /// Notifications dropped because they could not be decoded.
    pub malformed: u64,
}

#[derive(Debug, Default)]
struct Fanout {
    subscribers: Mutex<Vec<mpsc::Sender<Attestation>>>,
    received: AtomicU64,
    malformed: AtomicU64,
}

impl Fanout {
    async fn subscribe(&self, capacity: usize) -> Subscription<Attestation> {
        let (send, recv) = mpsc::channel(capacity.max(1));
        self.subscribers.lock().await.push(send);

        Subscription::from_receiver(recv)
    }

    /// Decodes a notification and delivers it to every live subscriber, waiting for buffer
    /// space. Subscribers whose receiving end was dropped are pruned.
    async fn publish(&self, notification: Result<SignedVaaNotification, String>) {
        let decoded = notification.and_then(|n| {
            Attestation::decode_hex(&n.vaa_bytes).map_err(|err| err.to_string())
        });
        let attestation = match decoded {
            Ok(attestation) => attestation,
            Err(reason) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(%reason, "dropping malformed attestation");
                return;
            }
        };

        self.received.fetch_add(1, Ordering::Relaxed);
        debug!(id = %attestation.id(), "received attestation");

        let mut subscribers = self.subscribers.lock().await;
        let mut live = Vec::with_capacity(subscribers.len());
        for sub in subscribers.drain(..) {
            if sub.send(attestation.clone()).await.is_ok() {
                live.push(sub);
            }
        }
        *subscribers = live;
    }

    async fn close(&self) {
        self.subscribers.lock().await.clear();
    }

    fn stats(&self) -> FeedStats {
        FeedStats {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

struct Session {
    // dropping the client tears down the connection
    _client: WsClient,
    sub: RpcSubscription<SignedVaaNotification>,
}

enum PumpEnd {
    Cancelled,
    Disconnected,
}

/// Long-lived connection to the attestation feed.
///
/// Dropping this object aborts the background task. Prefer [`AttestationFeed::close`] which
/// unsubscribes cleanly.
#[derive(Debug)]
pub struct AttestationFeed {
    fanout: Arc<Fanout>,
    channel_capacity: usize,
    cancel: CancellationToken,
    thread_handle: Option<JoinHandle<()>>,
}

impl Drop for AttestationFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.thread_handle.take() {
            handle.abort();
        }
    }
}

impl AttestationFeed {
    /// Connects to the feed and starts the background task.
    ///
    /// The returned [`Subscription`] is registered before the first notification is read, so it
    /// sees every attestation the feed delivers.
    ///
    /// The initial connection is retried at most `startup_max_retries` times. Afterwards the feed
    /// reconnects indefinitely until `cancel` fires or [`Self::close`] is called.
    pub async fn connect(
        cfg: FeedConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, Subscription<Attestation>), FeedError> {
        let cancel = cancel.child_token();
        let strategy = reconnect_strategy(&cfg).with_max_retries(cfg.startup_max_retries);

        info!(url = %cfg.ws_url, network = %cfg.network, "connecting to attestation feed");
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FeedError::Closed),
            res = retry_with(strategy, |attempt| open_session(&cfg, attempt)) => res?,
        };
        info!(url = %cfg.ws_url, "subscribed to attestation feed");

        let fanout = Arc::new(Fanout::default());
        let channel_capacity = cfg.channel_capacity;
        let first = fanout.subscribe(channel_capacity).await;
        let thread_handle = task::spawn(run(cfg, session, fanout.clone(), cancel.clone()));

        let feed = Self {
            fanout,
            channel_capacity,
            cancel,
            thread_handle: Some(thread_handle),
        };

        Ok((feed, first))
    }

    /// Creates a new [`Subscription`] that yields every attestation received from now on.
    pub async fn subscribe(&self) -> Subscription<Attestation> {
        self.fanout.subscribe(self.channel_capacity).await
    }

    /// Current counters.
    pub fn stats(&self) -> FeedStats {
        self.fanout.stats()
    }

    /// Unsubscribes, closes the connection and ends all subscriptions.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.thread_handle.take() {
            if let Err(err) = handle.await {
                warn!(%err, "attestation feed task ended abnormally");
            }
        }
    }
}

fn reconnect_strategy(cfg: &FeedConfig) -> Strategy<FeedError> {
    let backoff = cfg.reconnect;
    Strategy::new(move |err: &FeedError, attempt| {
        let delay = backoff.delay(attempt);
        warn!(%err, %attempt, ?delay, "attestation feed unavailable, retrying");
        RetryAction::Retry(delay)
    })
}

async fn open_session(cfg: &FeedConfig, attempt: usize) -> Result<Session, FeedError> {
    debug!(url = %cfg.ws_url, %attempt, "dialing attestation feed");
    let client = WsClientBuilder::default()
        .connection_timeout(cfg.connection_timeout)
        .build(&cfg.ws_url)
        .await
        .map_err(|e| FeedError::Connect {
            url: cfg.ws_url.clone(),
            reason: e.to_string(),
        })?;

    let sub = client
        .subscribe::<SignedVaaNotification, _>(
            &cfg.subscribe_method,
            rpc_params![cfg.network.to_string()],
            &cfg.unsubscribe_method,
        )
        .await
        .map_err(|e| FeedError::Subscribe {
            method: cfg.subscribe_method.clone(),
            reason: e.to_string(),
        })?;

    Ok(Session {
        _client: client,
        sub,
    })
}

async fn run(
    cfg: FeedConfig,
    mut session: Session,
    fanout: Arc<Fanout>,
    cancel: CancellationToken,
) {
    loop {
        match pump(&mut session, &fanout, &cancel).await {
            PumpEnd::Cancelled => {
                if let Err(err) = session.sub.unsubscribe().await {
                    debug!(%err, "unsubscribe failed");
                }
                break;
            }
            PumpEnd::Disconnected => warn!(url = %cfg.ws_url, "attestation feed disconnected"),
        }

        let strategy = reconnect_strategy(&cfg);
        session = tokio::select! {
            _ = cancel.cancelled() => break,
            res = retry_with(strategy, |attempt| open_session(&cfg, attempt)) => match res {
                Ok(session) => session,
                Err(err) => {
                    error!(%err, "giving up on attestation feed");
                    break;
                }
            },
        };
        info!(url = %cfg.ws_url, "resubscribed to attestation feed");
    }

    fanout.close().await;
    info!("attestation feed closed");
}

async fn pump(session: &mut Session, fanout: &Fanout, cancel: &CancellationToken) -> PumpEnd {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return PumpEnd::Cancelled,
            item = session.sub.next() => item,
        };
        let Some(item) = item else {
            return PumpEnd::Disconnected;
        };

        tokio::select! {
            _ = cancel.cancelled() => return PumpEnd::Cancelled,
            _ = fanout.publish(item.map_err(|e| e.to_string())) => {}
        }
    }
}
