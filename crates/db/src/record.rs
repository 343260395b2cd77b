//! The per-attestation processing record.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use relayer_primitives::{attestation::AttestationId, outcome::TxId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an attestation.
///
/// `Pending -> InFlight -> {Confirmed | FailedPermanent}`. A record only moves back from
/// `InFlight` to `Pending` during restart recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Known but not currently being worked on.
    Pending,

    /// Owned by exactly one worker.
    InFlight,

    /// Accepted by the destination chain.
    Confirmed,

    /// Gave up. See [`ProcessingRecord::retryable`].
    FailedPermanent,
}

impl ProcessingStatus {
    /// The stable string used for storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::InFlight => "in_flight",
            ProcessingStatus::Confirmed => "confirmed",
            ProcessingStatus::FailedPermanent => "failed_permanent",
        }
    }

    /// Whether the status is final.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Confirmed | ProcessingStatus::FailedPermanent
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "in_flight" => Ok(ProcessingStatus::InFlight),
            "confirmed" => Ok(ProcessingStatus::Confirmed),
            "failed_permanent" => Ok(ProcessingStatus::FailedPermanent),
            other => Err(format!("unknown processing status: {other}")),
        }
    }
}

/// Everything the relayer remembers about one attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRecord {
    /// Dedup identity.
    pub id: AttestationId,

    /// Current lifecycle state.
    pub status: ProcessingStatus,

    /// Destination transaction, once confirmed.
    pub destination_tx: Option<TxId>,

    /// Total submissions made across all dispatches.
    pub attempts: u32,

    /// Last error reported for this attestation.
    pub last_error: Option<String>,

    /// For `FailedPermanent` records, whether a redelivery may start a new dispatch.
    pub retryable: bool,

    /// The raw envelope, kept so that recovered records can be dispatched again.
    pub envelope: Vec<u8>,

    /// When the record was first created.
    pub created_at: DateTime<Utc>,

    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRecord {
    /// Whether a new dispatch may claim this record.
    pub const fn is_claimable(&self) -> bool {
        match self.status {
            ProcessingStatus::Pending => true,
            ProcessingStatus::FailedPermanent => self.retryable,
            ProcessingStatus::InFlight | ProcessingStatus::Confirmed => false,
        }
    }
}
