//! Results of relaying an attestation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a transaction accepted by a destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Wraps a chain-specific transaction identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final result of a dispatch, recorded in the processing ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The destination chain accepted the verification transaction.
    Confirmed {
        /// Transaction that carried the verification.
        tx_id: TxId,
        /// Number of submissions made, including the successful one.
        attempts: u32,
    },

    /// No submission succeeded.
    Failed {
        /// Description of the last error seen.
        error: String,
        /// Number of submissions made.
        attempts: u32,
        /// Whether the attestation may be tried again on redelivery. Only set when the attempt
        /// budget ran out; a rejection by the destination is final.
        retryable: bool,
    },
}

impl Outcome {
    /// Number of submissions made.
    pub const fn attempts(&self) -> u32 {
        match self {
            Outcome::Confirmed { attempts, .. } | Outcome::Failed { attempts, .. } => *attempts,
        }
    }

    /// Whether the outcome is a confirmation.
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Confirmed { tx_id, attempts } => {
                write!(f, "confirmed tx {tx_id} after {attempts} attempt(s)")
            }
            Outcome::Failed {
                error,
                attempts,
                retryable,
            } => write!(
                f,
                "failed after {attempts} attempt(s) (retryable: {retryable}): {error}"
            ),
        }
    }
}
