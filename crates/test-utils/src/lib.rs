//! Test utilities shared across the relayer crates.
//!
//! [`fixtures`] builds well-formed attestation envelopes and routes; [`client`] provides a
//! [`chain_clients::client::ChainClient`] whose responses are scripted by the test. [`logs`]
//! records emitted `tracing` events.

pub mod client;
pub mod fixtures;
pub mod logs;
