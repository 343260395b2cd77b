//! Lookup of chain clients by destination chain.

use std::{collections::HashMap, sync::Arc};

use relayer_primitives::{chain::ChainId, route::RouteTable};
use tracing::info;

use crate::{
    aztec::AztecClient,
    client::ChainClient,
    config::ChainClientConfig,
    errors::ClientInitError,
    evm,
};

/// One client per destination chain, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<ChainId, Arc<dyn ChainClient>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a client for every configured chain.
    pub fn from_configs<'a>(
        configs: impl IntoIterator<Item = &'a ChainClientConfig>,
    ) -> Result<Self, ClientInitError> {
        let mut registry = Self::new();
        for config in configs {
            let client: Arc<dyn ChainClient> = match config {
                ChainClientConfig::Evm(cfg) => Arc::new(evm::connect(cfg)?),
                ChainClientConfig::Aztec(cfg) => Arc::new(AztecClient::new(cfg)?),
            };
            registry.register(client)?;
        }

        Ok(registry)
    }

    /// Adds a client. Each chain may only have one.
    pub fn register(&mut self, client: Arc<dyn ChainClient>) -> Result<(), ClientInitError> {
        let chain_id = client.chain_id();
        if self.clients.contains_key(&chain_id) {
            return Err(ClientInitError::DuplicateChain(chain_id));
        }

        info!(chain = %chain_id, secondary = %client.has_secondary_path(), "registered chain client");
        self.clients.insert(chain_id, client);

        Ok(())
    }

    /// Returns the client for `chain_id`, if any.
    pub fn get(&self, chain_id: ChainId) -> Option<Arc<dyn ChainClient>> {
        self.clients.get(&chain_id).cloned()
    }

    /// Fails if any route targets a chain without a client.
    pub fn ensure_routes(&self, routes: &RouteTable) -> Result<(), ClientInitError> {
        match routes
            .iter()
            .find(|route| !self.clients.contains_key(&route.destination_chain))
        {
            Some(route) => Err(ClientInitError::MissingClient {
                origin_chain: route.origin_chain,
                emitter: route.emitter,
                destination_chain: route.destination_chain,
            }),
            None => Ok(()),
        }
    }

    /// Chains that have a client, in ascending order.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<_> = self.clients.keys().copied().collect();
        chains.sort();
        chains
    }
}
