//! Decoding of the signed attestation envelope (VAA v1).
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! version              u8     (must be 1)
//! guardian_set_index   u32
//! num_signatures       u8
//! signatures           num_signatures * (guardian_index u8 || signature [u8; 65])
//! timestamp            u32
//! nonce                u32
//! emitter_chain        u16
//! emitter_address      [u8; 32]
//! sequence             u64
//! consistency_level    u8
//! payload              remaining bytes
//! ```

use thiserror::Error;

use crate::{
    attestation::{Attestation, AttestationId, EmitterAddress, GuardianSignature},
    chain::ChainId,
    constants::{
        BODY_FIXED_LEN, EMITTER_ADDRESS_LEN, HEADER_LEN, SIGNATURE_ENTRY_LEN,
        SUPPORTED_VAA_VERSION,
    },
};

/// Errors that can occur while decoding an attestation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The envelope ended before a required field.
    #[error("envelope truncated while reading {field}: need {needed} bytes, have {remaining}")]
    Truncated {
        /// The field being read.
        field: &'static str,
        /// Bytes required for the field.
        needed: usize,
        /// Bytes left in the envelope.
        remaining: usize,
    },

    /// The envelope declares a version this relayer does not understand.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// The envelope was not valid hex.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() < n {
            return Err(DecodeError::Truncated {
                field,
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    fn rest(self) -> &'a [u8] {
        self.buf
    }
}

impl Attestation {
    /// Decodes an attestation from its binary envelope.
    ///
    /// Signatures are parsed but not verified.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(raw);

        let version = reader.u8("version")?;
        if version != SUPPORTED_VAA_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let guardian_set_index = reader.u32("guardian_set_index")?;
        let num_signatures = reader.u8("num_signatures")? as usize;

        // check the whole signature block up front so the error names the real shortfall
        let needed = num_signatures * SIGNATURE_ENTRY_LEN + BODY_FIXED_LEN;
        if raw.len() < HEADER_LEN + needed {
            return Err(DecodeError::Truncated {
                field: "signatures",
                needed,
                remaining: raw.len().saturating_sub(HEADER_LEN),
            });
        }

        let signatures = (0..num_signatures)
            .map(|_| {
                Ok(GuardianSignature {
                    guardian_index: reader.u8("guardian_index")?,
                    signature: reader.array::<65>("signature")?,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        let timestamp = reader.u32("timestamp")?;
        let nonce = reader.u32("nonce")?;
        let emitter_chain = ChainId::new(reader.u16("emitter_chain")?);
        let emitter = EmitterAddress::new(reader.array::<EMITTER_ADDRESS_LEN>("emitter_address")?);
        let sequence = reader.u64("sequence")?;
        let consistency_level = reader.u8("consistency_level")?;
        let payload = reader.rest().to_vec();

        Ok(Attestation {
            guardian_set_index,
            signatures,
            timestamp,
            nonce,
            id: AttestationId {
                emitter_chain,
                emitter,
                sequence,
            },
            consistency_level,
            payload,
            raw: raw.to_vec(),
        })
    }

    /// Decodes an attestation from a hex string, with or without a `0x` prefix.
    pub fn decode_hex(s: &str) -> Result<Self, DecodeError> {
        let s = s.trim();
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(stripped).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;

        Self::decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn encode(num_sigs: u8, chain: u16, sequence: u64, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![1u8];
        buf.extend_from_slice(&7u32.to_be_bytes());
        buf.push(num_sigs);
        for i in 0..num_sigs {
            buf.push(i);
            buf.extend_from_slice(&[i; 65]);
        }
        buf.extend_from_slice(&1_700_000_000u32.to_be_bytes());
        buf.extend_from_slice(&42u32.to_be_bytes());
        buf.extend_from_slice(&chain.to_be_bytes());
        buf.extend_from_slice(&[0xab; 32]);
        buf.extend_from_slice(&sequence.to_be_bytes());
        buf.push(15);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn decodes_all_fields() {
        let raw = encode(2, 52, 100, b"hello");
        let att = Attestation::decode(&raw).expect("must decode");

        assert_eq!(att.guardian_set_index(), 7);
        assert_eq!(att.signatures().len(), 2);
        assert_eq!(att.signatures()[1].guardian_index, 1);
        assert_eq!(att.signatures()[1].signature, [1u8; 65]);
        assert_eq!(att.timestamp(), 1_700_000_000);
        assert_eq!(att.nonce(), 42);
        assert_eq!(att.emitter_chain(), ChainId::AZTEC);
        assert_eq!(att.emitter().as_bytes(), &[0xab; 32]);
        assert_eq!(att.sequence(), 100);
        assert_eq!(att.consistency_level(), 15);
        assert_eq!(att.payload(), b"hello");
        assert_eq!(att.raw(), raw.as_slice());
    }

    #[test]
    fn empty_payload_is_valid() {
        let raw = encode(0, 2, 1, &[]);
        let att = Attestation::decode(&raw).expect("must decode");
        assert!(att.payload().is_empty());
    }

    #[test]
    fn rejects_unknown_version() {
        let mut raw = encode(1, 2, 1, b"x");
        raw[0] = 2;
        assert_eq!(
            Attestation::decode(&raw),
            Err(DecodeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn rejects_truncated_signatures() {
        let mut raw = encode(3, 2, 1, &[]);
        raw.truncate(HEADER_LEN + SIGNATURE_ENTRY_LEN);
        assert!(matches!(
            Attestation::decode(&raw),
            Err(DecodeError::Truncated {
                field: "signatures",
                ..
            })
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            Attestation::decode(&[]),
            Err(DecodeError::Truncated {
                field: "version",
                ..
            })
        ));
    }

    #[test]
    fn decode_hex_handles_prefix_and_garbage() {
        let raw = encode(1, 10003, 5, b"p");
        let with_prefix = format!("0x{}", hex::encode(&raw));
        assert_eq!(
            Attestation::decode_hex(&with_prefix).unwrap().sequence(),
            5
        );
        assert_eq!(
            Attestation::decode_hex(&hex::encode(&raw)).unwrap().sequence(),
            5
        );
        assert!(matches!(
            Attestation::decode_hex("0xnothex"),
            Err(DecodeError::InvalidHex(_))
        ));
    }

    proptest! {
        #[test]
        fn decoding_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = Attestation::decode(&bytes);
        }

        #[test]
        fn any_truncation_of_a_valid_envelope_is_rejected(cut in 0usize..(HEADER_LEN + 2 * SIGNATURE_ENTRY_LEN + BODY_FIXED_LEN)) {
            let raw = encode(2, 52, 9, &[]);
            prop_assert!(Attestation::decode(&raw[..cut]).is_err());
        }
    }
}
