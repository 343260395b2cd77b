//! Durable bookkeeping of which attestations have been relayed.
//!
//! The [`ledger::ProcessingLedger`] is the single owner of a record's lifecycle. Two
//! implementations are provided: [`inmemory::InMemoryLedger`] for tests and development and
//! [`persistent::SqliteLedger`] for production.

pub mod errors;
pub mod inmemory;
pub mod ledger;
pub mod persistent;
pub mod record;
