//! The decoded attestation envelope and its identity.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{chain::ChainId, constants::EMITTER_ADDRESS_LEN};

/// Address of the contract on the origin chain that emitted the underlying event.
///
/// Stored in the guardian network's canonical 32-byte form. Shorter addresses are left-padded.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmitterAddress([u8; EMITTER_ADDRESS_LEN]);

/// Error returned when an emitter address cannot be parsed from its hex representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitterAddressError {
    /// The string is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded address is longer than 32 bytes.
    #[error("address too long: {0} bytes")]
    TooLong(usize),
}

impl EmitterAddress {
    /// Creates an emitter address from its canonical 32-byte form.
    pub const fn new(bytes: [u8; EMITTER_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the canonical 32-byte form.
    pub const fn as_bytes(&self) -> &[u8; EMITTER_ADDRESS_LEN] {
        &self.0
    }

    /// Returns the lowercase `0x`-prefixed hex encoding of the canonical form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for EmitterAddress {
    type Err = EmitterAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        // an odd number of nibbles is allowed and treated as if it had a leading zero
        let padded = if stripped.len() % 2 == 1 {
            format!("0{stripped}")
        } else {
            stripped.to_string()
        };

        let decoded =
            hex::decode(&padded).map_err(|e| EmitterAddressError::InvalidHex(e.to_string()))?;
        if decoded.len() > EMITTER_ADDRESS_LEN {
            return Err(EmitterAddressError::TooLong(decoded.len()));
        }

        let mut bytes = [0u8; EMITTER_ADDRESS_LEN];
        bytes[EMITTER_ADDRESS_LEN - decoded.len()..].copy_from_slice(&decoded);

        Ok(Self(bytes))
    }
}

impl fmt::Display for EmitterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EmitterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmitterAddress({})", self.to_hex())
    }
}

impl Serialize for EmitterAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EmitterAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// The identity of an attestation for deduplication purposes.
///
/// A well-behaved guardian network never reuses this triple, but the relayer does not rely on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttestationId {
    /// Chain on which the underlying event happened.
    pub emitter_chain: ChainId,

    /// Contract that emitted the underlying event.
    pub emitter: EmitterAddress,

    /// Per-emitter, monotonically increasing sequence number.
    pub sequence: u64,
}

impl fmt::Display for AttestationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.emitter_chain.get(),
            self.emitter,
            self.sequence
        )
    }
}

/// A single guardian's signature over the attestation body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianSignature {
    /// Index of the guardian in the guardian set.
    pub guardian_index: u8,

    /// Recoverable ECDSA signature (r, s, v).
    pub signature: [u8; 65],
}

/// A decoded, signed cross-chain attestation.
///
/// The relayer never validates the signatures; they are carried so that operators can inspect
/// them and so that the original encoding can be forwarded verbatim to destination chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub(crate) guardian_set_index: u32,
    pub(crate) signatures: Vec<GuardianSignature>,
    pub(crate) timestamp: u32,
    pub(crate) nonce: u32,
    pub(crate) id: AttestationId,
    pub(crate) consistency_level: u8,
    pub(crate) payload: Vec<u8>,
    pub(crate) raw: Vec<u8>,
}

impl Attestation {
    /// Returns the dedup identity of this attestation.
    pub const fn id(&self) -> AttestationId {
        self.id
    }

    /// Origin chain of the attestation.
    pub const fn emitter_chain(&self) -> ChainId {
        self.id.emitter_chain
    }

    /// Emitter of the attestation.
    pub const fn emitter(&self) -> &EmitterAddress {
        &self.id.emitter
    }

    /// Sequence number of the attestation.
    pub const fn sequence(&self) -> u64 {
        self.id.sequence
    }

    /// Index of the guardian set that signed the attestation.
    pub const fn guardian_set_index(&self) -> u32 {
        self.guardian_set_index
    }

    /// Guardian signatures carried by the envelope.
    pub fn signatures(&self) -> &[GuardianSignature] {
        &self.signatures
    }

    /// Origin-chain timestamp of the underlying event.
    pub const fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Nonce chosen by the emitter.
    pub const fn nonce(&self) -> u32 {
        self.nonce
    }

    /// Finality level requested by the emitter.
    pub const fn consistency_level(&self) -> u8 {
        self.consistency_level
    }

    /// The application payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The full envelope exactly as it was received. This is what gets submitted to destination
    /// chains.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}
