//! Decides which attestations the relayer acts on.

use relayer_primitives::{
    attestation::Attestation,
    route::{Route, RouteTable},
};

/// Returns the route for `attestation`, or `None` if no route watches its emitter.
///
/// Matching is exact on origin chain and emitter address.
pub fn is_relevant<'a>(attestation: &Attestation, routes: &'a RouteTable) -> Option<&'a Route> {
    routes.lookup(attestation.emitter_chain(), attestation.emitter())
}
