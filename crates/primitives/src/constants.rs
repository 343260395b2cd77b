//! Constants describing the binary layout of a signed attestation envelope (VAA v1).

/// The only envelope version this relayer understands.
pub const SUPPORTED_VAA_VERSION: u8 = 1;

/// Length of the fixed header preceding the signatures: version, guardian set index and the
/// signature count.
pub const HEADER_LEN: usize = 1 + 4 + 1;

/// Length of a single guardian signature entry: guardian index followed by a recoverable ECDSA
/// signature.
pub const SIGNATURE_ENTRY_LEN: usize = 1 + 65;

/// Length of the fixed part of the body preceding the payload.
///
/// timestamp (4) + nonce (4) + emitter chain (2) + emitter address (32) + sequence (8) +
/// consistency level (1)
pub const BODY_FIXED_LEN: usize = 4 + 4 + 2 + 32 + 8 + 1;

/// Length of an emitter address in bytes. Addresses shorter than this (e.g. 20-byte EVM addresses)
/// are left-padded with zeros.
pub const EMITTER_ADDRESS_LEN: usize = 32;
