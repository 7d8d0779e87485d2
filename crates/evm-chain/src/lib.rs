// Copyright (C) 2022-2024 Bridgeworks Developers.
//
// Bridgeworks is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Bridgeworks is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

//! # EVM Chain Bridge Module 🕸️
//!
//! One endpoint of the bridged pair, speaking standard EVM JSON-RPC.
//!
//! The bridge owns the gateway endpoint lists of its chain and maps each
//! consumed RPC method onto the dispatcher reduction that fits it: plain
//! lookups take the first answering endpoint, block numbers and pool
//! nonces are max-reduced so a lagging endpoint cannot roll us backwards,
//! and raw transaction broadcast fans out to everything including the
//! extended list.

/// Unsigned outbound transaction assembly.
mod build_tx;
/// The eth JSON-RPC call surface.
mod callapi;
/// Per-pair outbound nonce tracking.
mod nonce;
/// Local and DTS transaction signing.
mod sign_tx;

pub use nonce::NonceTracker;

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_chain_traits::token::{TokenConfig, TokenPairConfig};
use bridge_chain_traits::{
    BuildTxArgs, ChainBridge, NonceSetter, SignedTx,
};
use bridge_dts_client::DtsSigner;
use bridge_relayer_config::{ChainConfig, GatewayConfig};
use bridge_relayer_utils::retry::ConstantWithMaxRetryCount;
use bridge_relayer_utils::{Error, Result};
use bridge_rpc_dispatch::RpcDispatcher;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Address;

const NET_MAINNET: &str = "mainnet";
const NET_RINKEBY: &str = "rinkeby";
const NET_CUSTOM: &str = "custom";

/// An EVM chain endpoint of the bridge.
#[derive(Debug)]
pub struct EthBridge {
    is_src: bool,
    chain: ChainConfig,
    gateway: GatewayConfig,
    pairs: Arc<HashMap<String, TokenPairConfig>>,
    rpc: RpcDispatcher,
    nonces: NonceTracker,
    dts: Option<Arc<DtsSigner>>,
    signer_chain_id: u64,
    latest_block: AtomicU64,
}

impl EthBridge {
    /// Connects the bridge: recognizes the configured network against the
    /// gateway's reported chain id (fatal on mismatch) and primes the
    /// latest block number. The returned bridge is immutable.
    pub async fn connect(
        is_src: bool,
        chain: ChainConfig,
        gateway: GatewayConfig,
        pairs: Arc<HashMap<String, TokenPairConfig>>,
        dts: Option<Arc<DtsSigner>>,
    ) -> Result<Self> {
        let mut bridge = Self {
            is_src,
            chain,
            gateway,
            pairs,
            rpc: RpcDispatcher::default(),
            nonces: NonceTracker::default(),
            dts,
            signer_chain_id: 0,
            latest_block: AtomicU64::new(0),
        };
        bridge.verify_chain_id().await?;
        bridge.init_latest_block_number().await;
        Ok(bridge)
    }

    /// Whether this endpoint is the source chain of the pair set.
    pub fn is_src_endpoint(&self) -> bool {
        self.is_src
    }

    /// The chain id outbound transactions are signed for.
    pub fn signer_chain_id(&self) -> u64 {
        self.signer_chain_id
    }

    pub(crate) fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    pub(crate) fn rpc(&self) -> &RpcDispatcher {
        &self.rpc
    }

    pub(crate) fn dts(&self) -> Option<&Arc<DtsSigner>> {
        self.dts.as_ref()
    }

    pub(crate) fn pair_config(
        &self,
        pair_id: &str,
    ) -> Result<&TokenPairConfig> {
        self.pairs
            .get(pair_id)
            .ok_or_else(|| Error::TokenPairNotFound(pair_id.to_string()))
    }

    /// This bridge's token endpoint of a pair.
    fn own_token(&self, pair_id: &str) -> Option<&TokenConfig> {
        let pair = self.pairs.get(pair_id)?;
        if self.is_src {
            Some(&pair.src_token)
        } else {
            Some(&pair.dest_token)
        }
    }

    async fn verify_chain_id(&mut self) -> Result<()> {
        let network = self.chain.net_id.to_lowercase();
        match network.as_str() {
            NET_MAINNET | NET_RINKEBY | NET_CUSTOM => {}
            _ => return Err(Error::UnsupportedNetwork(network)),
        }

        let policy =
            ConstantWithMaxRetryCount::new(Duration::from_secs(1), 4);
        let chain_id = backoff::future::retry(policy, || async {
            self.get_signer_chain_id().await.map_err(|e| {
                tracing::error!(error = %e, "can not get gateway chain id");
                backoff::Error::transient(e)
            })
        })
        .await?;

        let mismatch = || Error::ChainIdMismatch {
            net_id: self.chain.net_id.clone(),
            chain_id,
        };
        match network.as_str() {
            NET_MAINNET if chain_id != 1 => return Err(mismatch()),
            NET_RINKEBY if chain_id != 4 => return Err(mismatch()),
            _ => {}
        }

        self.signer_chain_id = chain_id;
        tracing::info!(network, chain_id, "verify chain id succeed");
        Ok(())
    }

    /// The gateway must know its head before any swap runs; keep asking
    /// until it answers.
    async fn init_latest_block_number(&self) {
        loop {
            match self.get_latest_block_number().await {
                Ok(latest) => {
                    tracing::info!(
                        number = latest,
                        block_chain = %self.chain.block_chain,
                        net_id = %self.chain.net_id,
                        "get latest block number succeed",
                    );
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        block_chain = %self.chain.block_chain,
                        net_id = %self.chain.net_id,
                        error = %e,
                        "get latest block number failed",
                    );
                    tokio::time::sleep(Duration::from_secs(3)).await;
                }
            }
        }
    }
}

#[async_trait]
impl ChainBridge for EthBridge {
    fn is_src(&self) -> bool {
        self.is_src
    }

    fn token_config(&self, pair_id: &str) -> Option<TokenConfig> {
        self.own_token(pair_id).cloned()
    }

    fn nonce_setter(&self) -> Option<&dyn NonceSetter> {
        Some(&self.nonces)
    }

    async fn get_latest_block_number(&self) -> Result<u64> {
        self.latest_block_number().await
    }

    async fn get_pool_nonce(&self, address: Address) -> Result<u64> {
        self.pool_nonce(address, "pending").await
    }

    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<TypedTransaction> {
        self.build_tx(args).await
    }

    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        pair_id: &str,
    ) -> Result<SignedTx> {
        self.sign_tx_locally(tx, pair_id)
    }

    async fn dts_sign_transaction(
        &self,
        tx: &TypedTransaction,
        args: &BuildTxArgs,
    ) -> Result<SignedTx> {
        self.dts_sign_tx(tx, args).await
    }

    async fn send_signed_transaction(&self, tx: &SignedTx) -> Result<()> {
        self.broadcast_raw_transaction(tx).await
    }
}
