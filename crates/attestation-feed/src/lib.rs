//! Client for the guardian network's signed attestation feed.
//!
//! [`client::AttestationFeed::connect`] hands back the first [`subscription::Subscription`];
//! further ones come from [`client::AttestationFeed::subscribe`]. Decoded attestations are consumed
//! through their [`futures::Stream`] API. The feed reconnects on its own until it is closed.

pub mod client;
pub mod config;
pub mod errors;
pub mod subscription;
