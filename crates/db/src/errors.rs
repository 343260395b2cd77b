//! Errors surfaced by the ledger implementations.

use relayer_primitives::attestation::AttestationId;
use thiserror::Error;

use crate::{persistent::errors::StorageError, record::ProcessingStatus};

/// Errors that can occur when interacting with a [`crate::ledger::ProcessingLedger`].
#[derive(Debug, Error)]
pub enum DbError {
    /// The backing store failed.
    #[error("sqlite: {0}")]
    Storage(#[from] StorageError),

    /// A commit was attempted on a record that is not in flight.
    #[error("cannot commit {id}: record is {}", .found.as_ref().map_or("missing", ProcessingStatus::as_str))]
    NotInFlight {
        /// The identity of the record.
        id: AttestationId,

        /// The status found, if the record exists at all.
        found: Option<ProcessingStatus>,
    },
}

/// Result alias for ledger operations.
pub type DbResult<T> = Result<T, DbError>;
