//! Destination chain adapters.
//!
//! Every destination chain family implements [`client::ChainClient`], which exposes a single
//! operation: submitting an attestation envelope for verification on a target contract. Clients
//! only report outcomes; retries and failover are decided by the caller.

pub mod aztec;
pub mod client;
pub mod config;
pub mod errors;
pub mod evm;
pub mod registry;
