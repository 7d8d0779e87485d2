//! Capability traits every bridged chain family implements, plus the swap
//! argument types that flow through the dispatch queues.

/// Token and token pair configuration.
pub mod token;

use std::collections::HashMap;

use async_trait::async_trait;
use bridge_relayer_utils::Result;
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, H256, U256,
};
use serde::{Deserialize, Serialize};

use token::TokenConfig;

/// The direction of a cross-chain swap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SwapType {
    /// Source chain deposit released/minted on the destination chain.
    Swapin,
    /// Destination chain burn released on the source chain.
    Swapout,
}

impl SwapType {
    /// Stable lowercase name, used in storage keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapType::Swapin => "swapin",
            SwapType::Swapout => "swapout",
        }
    }

    /// Whether this is the swapin direction.
    pub fn is_swapin(&self) -> bool {
        matches!(self, SwapType::Swapin)
    }
}

impl std::fmt::Display for SwapType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the executor needs to build one outbound transaction.
///
/// `(swap_type, swap_id, pair_id, bind)` uniquely identifies a swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTxArgs {
    /// Identifier of the relayer deployment that picked this swap up.
    pub identifier: String,
    /// The configured pair this swap belongs to.
    pub pair_id: String,
    /// The inbound transaction id.
    pub swap_id: String,
    /// The swap direction.
    pub swap_type: SwapType,
    /// The user supplied destination address on the target chain.
    pub bind: String,
    /// The DTS-controlled sender account on the target chain.
    pub from: Address,
    /// The exact inbound amount, in source token base units.
    pub origin_value: U256,
}

impl BuildTxArgs {
    /// The context string submitted alongside a DTS sign request, so the
    /// cluster members can audit what they are signing.
    pub fn msg_context(&self) -> String {
        serde_json::to_string(self).expect("swap args are always serializable")
    }
}

/// A signed outbound transaction, ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTx {
    /// RLP encoded signed transaction bytes.
    pub raw: Bytes,
    /// The transaction hash the chain will report for it.
    pub tx_hash: H256,
}

/// Optional capability: a bridge that tracks per-pair outbound nonces.
///
/// Bridges that do not assign account nonces (UTXO style chains) simply do
/// not expose it.
pub trait NonceSetter: Send + Sync {
    /// Seed the in-memory counters from persisted state at startup.
    fn init_nonces(&self, nonces: HashMap<String, u64>);
    /// The next unused nonce recorded for the pair.
    fn get_nonce(&self, pair_id: &str) -> u64;
    /// Record a new next-unused nonce. Never moves backwards.
    fn set_nonce(&self, pair_id: &str, nonce: u64);
}

/// The capability set a chain family must provide for the swap pipeline.
#[async_trait]
pub trait ChainBridge: Send + Sync + 'static {
    /// Whether this bridge is the source endpoint of the pair set.
    fn is_src(&self) -> bool;

    /// This bridge's token endpoint of the given pair.
    fn token_config(&self, pair_id: &str) -> Option<TokenConfig>;

    /// The nonce tracking capability, when this chain family has one.
    fn nonce_setter(&self) -> Option<&dyn NonceSetter> {
        None
    }

    /// The highest block number seen across the gateway endpoints.
    async fn get_latest_block_number(&self) -> Result<u64>;

    /// The account nonce including pending transactions, max-reduced
    /// across the gateway endpoints.
    async fn get_pool_nonce(&self, address: Address) -> Result<u64>;

    /// Assemble the unsigned outbound transaction for a swap.
    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<TypedTransaction>;

    /// Sign with the token's locally held key.
    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        pair_id: &str,
    ) -> Result<SignedTx>;

    /// Sign through the distributed threshold signing cluster.
    async fn dts_sign_transaction(
        &self,
        tx: &TypedTransaction,
        args: &BuildTxArgs,
    ) -> Result<SignedTx>;

    /// Broadcast to every configured endpoint, succeeding if any accepted.
    async fn send_signed_transaction(&self, tx: &SignedTx) -> Result<()>;
}
