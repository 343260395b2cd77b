//! Attestation and route fixtures.

use relayer_primitives::{
    attestation::{Attestation, EmitterAddress},
    chain::ChainId,
    route::{DestinationContext, Route},
};

/// Builds binary attestation envelopes with sensible defaults.
#[derive(Debug, Clone)]
pub struct AttestationBuilder {
    timestamp: u32,
    nonce: u32,
    emitter_chain: ChainId,
    emitter: [u8; 32],
    sequence: u64,
    consistency_level: u8,
    payload: Vec<u8>,
}

impl Default for AttestationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationBuilder {
    /// An attestation from emitter `0x..01` on Ethereum with sequence 0 and one signature.
    pub fn new() -> Self {
        let mut emitter = [0u8; 32];
        emitter[31] = 1;

        Self {
            timestamp: 1_700_000_000,
            nonce: 0,
            emitter_chain: ChainId::ETHEREUM,
            emitter,
            sequence: 0,
            consistency_level: 1,
            payload: b"payload".to_vec(),
        }
    }

    /// Sets the origin chain.
    pub const fn emitter_chain(mut self, chain: ChainId) -> Self {
        self.emitter_chain = chain;
        self
    }

    /// Sets the emitter to the address whose last byte is `byte` and all others zero.
    pub fn emitter_byte(mut self, byte: u8) -> Self {
        self.emitter = [0u8; 32];
        self.emitter[31] = byte;
        self
    }

    /// Sets the sequence number.
    pub const fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets the application payload.
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Encodes the envelope.
    pub fn encode(&self) -> Vec<u8> {
        // version 1, guardian set 0, one dummy signature from guardian 0
        let mut buf = vec![1u8];
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.push(1);
        buf.push(0);
        buf.extend_from_slice(&[1u8; 65]);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.emitter_chain.get().to_be_bytes());
        buf.extend_from_slice(&self.emitter);
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.push(self.consistency_level);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Encodes and decodes the envelope.
    pub fn build(&self) -> Attestation {
        Attestation::decode(&self.encode()).expect("builder must produce valid envelopes")
    }
}

/// The emitter address whose last byte is `byte`.
fn emitter(byte: u8) -> EmitterAddress {
    let mut bytes = [0u8; 32];
    bytes[31] = byte;
    EmitterAddress::new(bytes)
}

/// A route from `emitter(emitter_byte)` on `origin` to `target` on `destination`.
pub fn route(origin: ChainId, emitter_byte: u8, destination: ChainId, target: &str) -> Route {
    Route {
        origin_chain: origin,
        emitter: emitter(emitter_byte),
        destination_chain: destination,
        target: DestinationContext::new(target),
    }
}
