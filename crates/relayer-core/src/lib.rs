//! The relay pipeline.
//!
//! Attestations flow from a source stream through the [`filter`], into a bounded work queue and
//! out to a pool of workers. Each worker claims the attestation in the processing ledger, hands it
//! to the [`controller::RetryController`] through the [`dispatcher::Dispatcher`] and commits the
//! outcome.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod filter;
pub mod pipeline;
pub mod retention;
pub mod stats;
