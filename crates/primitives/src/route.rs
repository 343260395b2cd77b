//! Static routes between chains.

use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{attestation::EmitterAddress, chain::ChainId};

/// Chain-specific target of a verification submission, typically the address of the contract
/// that verifies attestations on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationContext(String);

impl DestinationContext {
    /// Creates a new destination context.
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Returns the target as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The direction of a relay, used to tag every log line produced for an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Direction {
    /// Chain the attestation originates from.
    pub origin: ChainId,

    /// Chain the attestation is submitted to.
    pub destination: ChainId,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.origin, self.destination)
    }
}

/// Maps attestations from a given emitter on an origin chain to a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Chain the watched emitter lives on.
    pub origin_chain: ChainId,

    /// Emitter whose attestations are relayed.
    pub emitter: EmitterAddress,

    /// Chain the attestations are submitted to.
    pub destination_chain: ChainId,

    /// Contract on the destination chain that verifies the attestation.
    pub target: DestinationContext,
}

impl Route {
    /// The relay direction of this route.
    pub const fn direction(&self) -> Direction {
        Direction {
            origin: self.origin_chain,
            destination: self.destination_chain,
        }
    }
}

/// Errors raised while building a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Two routes share the same `(origin chain, emitter)` key.
    #[error("duplicate route for emitter {emitter} on chain {origin_chain}")]
    Duplicate {
        /// Origin chain of the conflicting routes.
        origin_chain: ChainId,
        /// Emitter of the conflicting routes.
        emitter: EmitterAddress,
    },
}

/// Immutable lookup table from `(origin chain, emitter)` to [`Route`].
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<(ChainId, EmitterAddress), Route>,
}

impl RouteTable {
    /// Builds a route table, rejecting ambiguous configurations.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Result<Self, RouteError> {
        let mut table = HashMap::new();
        for route in routes {
            match table.entry((route.origin_chain, route.emitter)) {
                Entry::Occupied(_) => {
                    return Err(RouteError::Duplicate {
                        origin_chain: route.origin_chain,
                        emitter: route.emitter,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(route);
                }
            }
        }

        Ok(Self { routes: table })
    }

    /// Finds the route for the given origin chain and emitter, if any.
    pub fn lookup(&self, origin_chain: ChainId, emitter: &EmitterAddress) -> Option<&Route> {
        self.routes.get(&(origin_chain, *emitter))
    }

    /// Iterates over all routes in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Number of configured routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether there are no routes at all.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(origin: ChainId, emitter: &str, destination: ChainId) -> Route {
        Route {
            origin_chain: origin,
            emitter: emitter.parse().unwrap(),
            destination_chain: destination,
            target: DestinationContext::new("0xdead"),
        }
    }

    #[test]
    fn lookup_is_exact_on_chain_and_emitter() {
        let table = RouteTable::new([
            route(ChainId::AZTEC, "0x01", ChainId::ARBITRUM_SEPOLIA),
            route(ChainId::ARBITRUM_SEPOLIA, "0x02", ChainId::AZTEC),
        ])
        .unwrap();

        let e1: EmitterAddress = "0x01".parse().unwrap();
        let e2: EmitterAddress = "0x02".parse().unwrap();

        assert_eq!(
            table.lookup(ChainId::AZTEC, &e1).map(|r| r.destination_chain),
            Some(ChainId::ARBITRUM_SEPOLIA)
        );
        assert!(table.lookup(ChainId::AZTEC, &e2).is_none());
        assert!(table.lookup(ChainId::ARBITRUM_SEPOLIA, &e1).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let err = RouteTable::new([
            route(ChainId::AZTEC, "0x01", ChainId::ARBITRUM_SEPOLIA),
            route(ChainId::AZTEC, "0x0001", ChainId::BASE_SEPOLIA),
        ])
        .unwrap_err();

        assert!(matches!(err, RouteError::Duplicate { origin_chain, .. } if origin_chain == ChainId::AZTEC));
    }

    #[test]
    fn routes_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            routes: Vec<Route>,
        }

        let wrapper: Wrapper = toml::from_str(
            r#"
            [[routes]]
            origin_chain = 10003
            emitter = "0x0000000000000000000000000000000000000abc"
            destination_chain = 52
            target = "0x1234"
            "#,
        )
        .unwrap();

        let r = &wrapper.routes[0];
        assert_eq!(r.origin_chain, ChainId::ARBITRUM_SEPOLIA);
        assert_eq!(r.destination_chain, ChainId::AZTEC);
        assert_eq!(r.target.as_str(), "0x1234");
        assert_eq!(
            r.direction().to_string(),
            "arbitrum-sepolia(10003)->aztec(52)"
        );
    }
}
