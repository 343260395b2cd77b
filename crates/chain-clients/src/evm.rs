//! Client for EVM destination chains.

use std::{collections::HashMap, fmt};

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{keccak256, Address, Bytes, TxHash, B256},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolCall,
    transports::{http::reqwest::Url, RpcError, TransportError},
};
use async_trait::async_trait;
use relayer_primitives::{chain::ChainId, outcome::TxId, route::DestinationContext};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    client::{ChainClient, SubmissionPath},
    config::EvmClientConfig,
    errors::{ClientInitError, SubmitError},
};

sol! {
    /// Entry point of the attestation verifier contract.
    function verify(bytes encodedVm) external;
}

/// What became of a transaction broadcast by an earlier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriorTx {
    /// Mined and succeeded.
    Landed,
    /// Mined and reverted.
    Reverted,
    /// Known to the node but not mined yet.
    Pending,
    /// Unknown to the node, so it will never be mined.
    Dropped,
}

impl PriorTx {
    const fn classify(receipt_status: Option<bool>, known: bool) -> Self {
        match (receipt_status, known) {
            (Some(true), _) => Self::Landed,
            (Some(false), _) => Self::Reverted,
            (None, true) => Self::Pending,
            (None, false) => Self::Dropped,
        }
    }
}

/// Identifies a `verify` call independently of nonce and fees.
fn broadcast_key(to: Address, calldata: &[u8]) -> B256 {
    keccak256([to.as_slice(), calldata].concat())
}

/// Submits `verify(bytes)` calls from a single local account.
///
/// Submissions are serialized so that nonces are assigned in order. A transaction whose receipt
/// was not awaited to the end stays tracked until it is seen mined or dropped, and the next
/// submission of the same call resolves it instead of broadcasting a duplicate.
pub struct EvmClient<P> {
    chain_id: ChainId,
    provider: P,
    sender: Address,
    gas_limit: Option<u64>,
    broadcasts: Mutex<HashMap<B256, TxHash>>,
}

impl<P> fmt::Debug for EvmClient<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmClient")
            .field("chain_id", &self.chain_id)
            .field("sender", &self.sender)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}

impl<P: Provider> EvmClient<P> {
    /// Wraps an already configured provider. The provider must sign transactions from `sender`.
    pub fn new(chain_id: ChainId, provider: P, sender: Address, gas_limit: Option<u64>) -> Self {
        Self {
            chain_id,
            provider,
            sender,
            gas_limit,
            broadcasts: Mutex::new(HashMap::new()),
        }
    }

    /// The account submissions are sent from.
    pub const fn sender(&self) -> Address {
        self.sender
    }

    async fn prior_state(&self, tx_hash: TxHash) -> Result<PriorTx, SubmitError> {
        let lookup_failed = |e: TransportError| {
            SubmitError::Transient(format!("looking up transaction {tx_hash}: {e}"))
        };

        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(lookup_failed)?;
        let known = match &receipt {
            Some(_) => true,
            None => self
                .provider
                .get_transaction_by_hash(tx_hash)
                .await
                .map_err(lookup_failed)?
                .is_some(),
        };

        Ok(PriorTx::classify(
            receipt.as_ref().map(ReceiptResponse::status),
            known,
        ))
    }
}

/// Builds a client from configuration. Does not touch the network.
pub fn connect(
    config: &EvmClientConfig,
) -> Result<EvmClient<impl Provider + 'static>, ClientInitError> {
    let signer: PrivateKeySigner =
        config
            .private_key
            .expose()
            .parse()
            .map_err(|e| ClientInitError::InvalidKey {
                chain_id: config.chain_id,
                reason: format!("{e}"),
            })?;
    let sender = signer.address();

    let url: Url = config
        .rpc_url
        .parse()
        .map_err(|e| ClientInitError::InvalidUrl {
            url: config.rpc_url.clone(),
            reason: format!("{e}"),
        })?;

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::new(signer))
        .on_http(url);

    info!(chain = %config.chain_id, %sender, "evm client ready");

    Ok(EvmClient::new(
        config.chain_id,
        provider,
        sender,
        config.gas_limit,
    ))
}

#[async_trait]
impl<P: Provider + 'static> ChainClient for EvmClient<P> {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn submit_verification(
        &self,
        target: &DestinationContext,
        payload: &[u8],
        path: SubmissionPath,
    ) -> Result<TxId, SubmitError> {
        if path == SubmissionPath::Secondary {
            return Err(SubmitError::Permanent(
                "evm clients have no secondary path".to_string(),
            ));
        }

        let to: Address = target.as_str().parse().map_err(|e| {
            SubmitError::Permanent(format!("invalid target address {target}: {e}"))
        })?;
        let calldata = verifyCall {
            encodedVm: Bytes::copy_from_slice(payload),
        }
        .abi_encode();
        let key = broadcast_key(to, &calldata);

        let mut tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_to(to)
            .with_input(calldata);
        if let Some(gas_limit) = self.gas_limit {
            tx = tx.with_gas_limit(gas_limit);
        }

        let mut broadcasts = self.broadcasts.lock().await;

        if let Some(prior) = broadcasts.get(&key).copied() {
            match self.prior_state(prior).await? {
                PriorTx::Landed => {
                    broadcasts.remove(&key);
                    info!(chain = %self.chain_id, %prior, "earlier verify transaction landed");
                    return Ok(TxId::new(prior.to_string()));
                }
                PriorTx::Reverted => {
                    broadcasts.remove(&key);
                    return Err(SubmitError::Permanent(format!(
                        "transaction {prior} reverted"
                    )));
                }
                PriorTx::Pending => {
                    return Err(SubmitError::Transient(format!(
                        "transaction {prior} is still pending"
                    )));
                }
                PriorTx::Dropped => {
                    broadcasts.remove(&key);
                    debug!(chain = %self.chain_id, %prior, "earlier verify transaction was dropped");
                }
            }
        }

        debug!(chain = %self.chain_id, %to, len = payload.len(), "sending verify transaction");
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify_transport_error(&e))?;
        let tx_hash = *pending.tx_hash();
        broadcasts.insert(key, tx_hash);

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| SubmitError::Transient(format!("awaiting receipt of {tx_hash}: {e}")))?;
        broadcasts.remove(&key);
        if !receipt.status() {
            return Err(SubmitError::Permanent(format!(
                "transaction {tx_hash} reverted"
            )));
        }

        Ok(TxId::new(tx_hash.to_string()))
    }
}

fn classify_transport_error(err: &TransportError) -> SubmitError {
    match err {
        RpcError::ErrorResp(payload) => classify_rpc_message(&payload.message),
        other => SubmitError::Transient(other.to_string()),
    }
}

/// Maps a node's JSON-RPC error message to a [`SubmitError`].
///
/// Nonce and fee races resolve themselves once the pending pool moves on. Reverts and malformed
/// input will fail the same way every time.
pub fn classify_rpc_message(message: &str) -> SubmitError {
    const TRANSIENT: &[&str] = &[
        "nonce too low",
        "nonce too high",
        "replacement transaction underpriced",
        "transaction underpriced",
        "max fee per gas less than block base fee",
        "insufficient funds",
        "already known",
        "txpool is full",
        "timeout",
    ];
    const PERMANENT: &[&str] = &[
        "execution reverted",
        "revert",
        "invalid",
        "malformed",
        "already processed",
        "already verified",
    ];

    let lower = message.to_lowercase();
    if TRANSIENT.iter().any(|needle| lower.contains(needle)) {
        SubmitError::Transient(message.to_string())
    } else if PERMANENT.iter().any(|needle| lower.contains(needle)) {
        SubmitError::Permanent(message.to_string())
    } else {
        SubmitError::Transient(message.to_string())
    }
}
