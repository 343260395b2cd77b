//! This module contains the core [`Subscription`] type that consumers of this API will use to
//! observe new attestations.
use std::{
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::mpsc;

/// Created via [`crate::client::AttestationFeed::subscribe`]. From there you should use it via its
/// [`futures::Stream`] API.
///
/// The stream ends once the feed is closed.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Intentionally left private so as not to leak implementation details to consuming APIs.
    pub(crate) const fn from_receiver(receiver: mpsc::Receiver<T>) -> Subscription<T> {
        Subscription { receiver }
    }
}

impl<T> futures::Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
