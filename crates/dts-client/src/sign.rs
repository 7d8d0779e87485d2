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

use std::sync::Arc;
use std::time::Duration;

use bridge_relayer_config::dts::DtsConfig;
use bridge_relayer_types::rpc_url::RpcUrl;
use bridge_relayer_utils::retry::ConstantWithMaxRetryCount;
use bridge_relayer_utils::{probe, Error, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest};
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::rpc::{DtsRpc, HttpDtsRpc};

/// How often a node is probed before it is skipped for this round.
pub const PING_COUNT: usize = 3;
const PING_INTERVAL: Duration = Duration::from_secs(1);
/// How long one submitted sign request is polled before giving up on it.
const SIGN_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const RESTART_SIGN_LOOP_INTERVAL: Duration = Duration::from_secs(2);

/// Envelope transactions carry fixed gas parameters; the cluster chain
/// does not meter them like a public chain would.
const ENVELOPE_GAS_LIMIT: u64 = 100_000;
const ENVELOPE_GAS_PRICE: u64 = 80_000;

/// One initiator node of the signing cluster. Immutable after startup.
pub struct SignerNode {
    /// The node's RPC endpoint.
    pub rpc_url: RpcUrl,
    /// The account this relayer is registered as on the node.
    pub user_address: Address,
    /// Signs the sign-request envelopes for `user_address`.
    key: LocalWallet,
    /// Ordered list of signing sub-group identifiers.
    pub sign_groups: Vec<String>,
}

impl SignerNode {
    /// Creates a signer node handle.
    pub fn new(
        rpc_url: RpcUrl,
        user_address: Address,
        key: LocalWallet,
        sign_groups: Vec<String>,
    ) -> Self {
        Self {
            rpc_url,
            user_address,
            key,
            sign_groups,
        }
    }
}

impl std::fmt::Debug for SignerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerNode")
            .field("rpc_url", &self.rpc_url)
            .field("user_address", &self.user_address)
            .field("sign_groups", &self.sign_groups)
            .finish()
    }
}

/// The envelope payload a sign request is submitted with.
#[derive(Debug, Clone, Serialize)]
struct SignData {
    #[serde(rename = "TxType")]
    tx_type: &'static str,
    #[serde(rename = "PubKey")]
    pub_key: String,
    #[serde(rename = "MsgHash")]
    msg_hash: Vec<String>,
    #[serde(rename = "MsgContext")]
    msg_context: Vec<String>,
    #[serde(rename = "Keytype")]
    keytype: &'static str,
    #[serde(rename = "GroupID")]
    group_id: String,
    #[serde(rename = "ThresHold")]
    threshold: String,
    #[serde(rename = "Mode")]
    mode: String,
    #[serde(rename = "TimeStamp")]
    timestamp: String,
}

/// A completed sign request.
#[derive(Debug, Clone)]
pub struct DtsSignOutcome {
    /// The cluster key id the request was tracked under.
    pub key_id: String,
    /// One `r||s||v` hex string per requested message hash.
    pub rsvs: Vec<String>,
}

/// Client for requesting threshold signatures from the cluster.
///
/// Node and sub-group selection: nodes are tried in configuration order;
/// on a reachable node the sub-groups are tried starting from a uniformly
/// random index (OS CSPRNG) and rotating through all of them. When every
/// node and sub-group failed, the whole round restarts after a short
/// rest. Signing is expected to eventually succeed, so the outer loop is
/// unbounded; it only gives up when the relayer shuts down.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct DtsSigner<R: Default = HttpDtsRpc> {
    nodes: Arc<Vec<SignerNode>>,
    to_address: Address,
    chain_id: u64,
    #[builder(setter(into))]
    threshold: String,
    #[builder(setter(into))]
    mode: String,
    #[builder(default)]
    rpc: R,
    notify_shutdown: broadcast::Sender<()>,
    #[builder(default = SIGN_TIMEOUT)]
    sign_timeout: Duration,
}

impl DtsSigner<HttpDtsRpc> {
    /// Builds the signer from its config section.
    pub fn from_config(
        config: &DtsConfig,
        notify_shutdown: broadcast::Sender<()>,
    ) -> Result<Self> {
        if !config.enabled() {
            return Err(Error::DtsDisabled);
        }
        let mut nodes = Vec::with_capacity(config.initiators.len());
        for node in &config.initiators {
            let key = LocalWallet::from_bytes(node.key.as_bytes())?
                .with_chain_id(config.chain_id);
            nodes.push(SignerNode::new(
                node.rpc_url.clone(),
                node.user_address,
                key,
                node.sign_groups.clone(),
            ));
        }
        Ok(Self::builder()
            .nodes(Arc::new(nodes))
            .to_address(config.to_address)
            .chain_id(config.chain_id)
            .threshold(config.threshold.clone())
            .mode(config.mode.clone())
            .notify_shutdown(notify_shutdown)
            .build())
    }
}

impl<R: DtsRpc + Default> DtsSigner<R> {
    /// Sign a single message hash with its context.
    pub async fn do_sign_one(
        &self,
        sign_pubkey: &str,
        msg_hash: String,
        msg_context: String,
    ) -> Result<DtsSignOutcome> {
        self.do_sign(sign_pubkey, &[msg_hash], &[msg_context]).await
    }

    /// Sign a batch of message hashes with their contexts.
    pub async fn do_sign(
        &self,
        sign_pubkey: &str,
        msg_hashes: &[String],
        msg_contexts: &[String],
    ) -> Result<DtsSignOutcome> {
        if sign_pubkey.is_empty() {
            return Err(Error::EmptySignPubkey);
        }
        tracing::debug!(
            msg_hashes = ?msg_hashes,
            msg_contexts = ?msg_contexts,
            "dts do_sign"
        );
        let mut shutdown = self.notify_shutdown.subscribe();
        loop {
            for node in self.nodes.iter() {
                if self.ping_node(node).await.is_err() {
                    continue;
                }
                let group_count = node.sign_groups.len();
                if group_count == 0 {
                    continue;
                }
                // randomly pick the first subgroup to sign with
                let start_index = OsRng.gen_range(0..group_count);
                for offset in 0..group_count {
                    let group_index = (start_index + offset) % group_count;
                    match self
                        .do_sign_impl(
                            node,
                            group_index,
                            sign_pubkey,
                            msg_hashes,
                            msg_contexts,
                        )
                        .await
                    {
                        Ok(outcome) => return Ok(outcome),
                        Err(e) => {
                            tracing::trace!(
                                rpc_url = %node.rpc_url,
                                group = %node.sign_groups[group_index],
                                error = %e,
                                "sign attempt failed"
                            );
                        }
                    }
                }
            }
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Retry,
                dts_sign_round_failed = true,
            );
            tokio::select! {
                _ = shutdown.recv() => return Err(Error::ShuttingDown),
                _ = tokio::time::sleep(RESTART_SIGN_LOOP_INTERVAL) => {}
            }
        }
    }

    async fn ping_node(&self, node: &SignerNode) -> Result<()> {
        let policy =
            ConstantWithMaxRetryCount::new(PING_INTERVAL, PING_COUNT - 1);
        let probed = backoff::future::retry(policy, || async {
            self.rpc
                .get_enode(&node.rpc_url)
                .await
                .map_err(backoff::Error::transient)
        })
        .await;
        match probed {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(
                    rpc_url = %node.rpc_url,
                    ping_count = PING_COUNT,
                    error = %e,
                    "ping dts node failed"
                );
                Err(e)
            }
        }
    }

    async fn do_sign_impl(
        &self,
        node: &SignerNode,
        group_index: usize,
        sign_pubkey: &str,
        msg_hashes: &[String],
        msg_contexts: &[String],
    ) -> Result<DtsSignOutcome> {
        let nonce = self
            .rpc
            .get_sign_nonce(node.user_address, &node.rpc_url)
            .await?;
        let sign_data = SignData {
            tx_type: "SIGN",
            pub_key: sign_pubkey.to_string(),
            msg_hash: msg_hashes.to_vec(),
            msg_context: msg_contexts.to_vec(),
            keytype: "ECDSA",
            group_id: node.sign_groups[group_index].clone(),
            threshold: self.threshold.clone(),
            mode: self.mode.clone(),
            timestamp: now_milli_string(),
        };
        let payload = serde_json::to_vec(&sign_data)?;
        let raw_tx = self.build_envelope_tx(node, nonce, payload)?;
        let key_id = self.rpc.sign(&raw_tx, &node.rpc_url).await?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::DtsSign,
            submitted = true,
            %key_id,
            group = %node.sign_groups[group_index],
        );
        let rsvs = self.get_sign_result(&key_id, &node.rpc_url).await?;
        Ok(DtsSignOutcome { key_id, rsvs })
    }

    /// Wraps the sign payload into a signed envelope transaction, hex
    /// encoded the way the cluster expects to receive it.
    fn build_envelope_tx(
        &self,
        node: &SignerNode,
        nonce: u64,
        payload: Vec<u8>,
    ) -> Result<String> {
        let tx = TransactionRequest::new()
            .nonce(nonce)
            .to(self.to_address)
            .value(0u64)
            .gas(ENVELOPE_GAS_LIMIT)
            .gas_price(ENVELOPE_GAS_PRICE)
            .data(payload)
            .chain_id(self.chain_id);
        let tx = TypedTransaction::Legacy(tx);
        let signature = node.key.sign_transaction_sync(&tx)?;
        let raw = tx.rlp_signed(&signature);
        Ok(format!("0x{}", hex::encode(&raw)))
    }

    async fn get_sign_result(
        &self,
        key_id: &str,
        url: &RpcUrl,
    ) -> Result<Vec<String>> {
        tracing::info!(%key_id, "start get sign status");
        // the deadline is owned by this attempt; concurrent signs each
        // run their own timer
        let deadline = Instant::now() + self.sign_timeout;
        let mut retry_count = 0usize;
        loop {
            if Instant::now() >= deadline {
                tracing::info!(%key_id, retry_count, "get sign status failed");
                return Err(Error::SignTimerTimeout);
            }
            retry_count += 1;
            match self.rpc.get_sign_status(key_id, url).await {
                Ok(status) if !status.rsv.is_empty() => {
                    tracing::info!(
                        %key_id,
                        retry_count,
                        "get sign status success"
                    );
                    return Ok(status.rsv);
                }
                // accepted but no signature material yet, keep polling
                Ok(_) => {}
                Err(
                    e @ (Error::GetSignStatusFailed
                    | Error::GetSignStatusTimeout),
                ) => {
                    tracing::info!(%key_id, retry_count, error = %e, "get sign status failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::trace!(%key_id, error = %e, "sign status poll failed");
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn now_milli_string() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis();
    millis.to_string()
}
