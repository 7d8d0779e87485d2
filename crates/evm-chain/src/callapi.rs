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

use std::sync::atomic::Ordering;

use bridge_chain_traits::SignedTx;
use bridge_relayer_utils::{probe, Error, Result};
use ethers::types::{
    Address, Block, Bytes, Filter, Log, Transaction, TransactionReceipt,
    H256, U256, U64,
};
use serde_json::json;

use crate::EthBridge;

impl EthBridge {
    /// `eth_blockNumber`, max-reduced over the primary endpoints.
    pub async fn latest_block_number(&self) -> Result<u64> {
        let latest: U64 = self
            .rpc()
            .max_reduce(&self.gateway().api_address, "eth_blockNumber", json!([]))
            .await?;
        let latest = latest.as_u64();
        self.latest_block.fetch_max(latest, Ordering::Relaxed);
        Ok(latest)
    }

    /// The highest block number this bridge has seen so far.
    pub fn cached_latest_block_number(&self) -> u64 {
        self.latest_block.load(Ordering::Relaxed)
    }

    /// `eth_getBlockByHash`
    pub async fn get_block_by_hash(&self, hash: H256) -> Result<Block<H256>> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getBlockByHash",
                json!([hash, false]),
                "block",
            )
            .await
    }

    /// `eth_getBlockByNumber`
    pub async fn get_block_by_number(
        &self,
        number: U64,
    ) -> Result<Block<H256>> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getBlockByNumber",
                json!([number, false]),
                "block",
            )
            .await
    }

    /// `eth_getTransactionByHash`
    pub async fn get_transaction_by_hash(
        &self,
        hash: H256,
    ) -> Result<Transaction> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getTransactionByHash",
                json!([hash]),
                "tx",
            )
            .await
    }

    /// `eth_pendingTransactions`
    pub async fn get_pending_transactions(&self) -> Result<Vec<Transaction>> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_pendingTransactions",
                json!([]),
                "pending txs",
            )
            .await
    }

    /// `eth_getTransactionReceipt`, falling back to the extended endpoint
    /// list when the primary list does not know the transaction.
    pub async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<TransactionReceipt> {
        let params = json!([hash]);
        let primary = self
            .rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getTransactionReceipt",
                params.clone(),
                "tx receipt",
            )
            .await;
        match primary {
            Ok(receipt) => Ok(receipt),
            Err(e) if self.gateway().api_address_ext.is_empty() => Err(e),
            Err(_) => {
                self.rpc()
                    .first_success(
                        &self.gateway().api_address_ext,
                        "eth_getTransactionReceipt",
                        params,
                        "tx receipt",
                    )
                    .await
            }
        }
    }

    /// `eth_getLogs`
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getLogs",
                json!([filter]),
                "logs",
            )
            .await
    }

    /// `eth_getTransactionCount`, max-reduced over the primary endpoints
    /// so a lagging endpoint can never hand out a stale nonce.
    pub async fn pool_nonce(
        &self,
        address: Address,
        height: &str,
    ) -> Result<u64> {
        let nonce: U64 = self
            .rpc()
            .max_reduce(
                &self.gateway().api_address,
                "eth_getTransactionCount",
                json!([address, height]),
            )
            .await?;
        Ok(nonce.as_u64())
    }

    /// `eth_gasPrice`: the greater of the two endpoint lists' maxima, so
    /// the transaction is priced for whichever set of peers sees the
    /// higher market.
    pub async fn suggest_price(&self) -> Result<U256> {
        let ext = &self.gateway().api_address_ext;
        let mut best: Option<U256> = None;
        let mut last_err = None;
        if !ext.is_empty() {
            match self
                .rpc()
                .max_reduce::<U256>(ext, "eth_gasPrice", json!([]))
                .await
            {
                Ok(price) => best = Some(price),
                Err(e) => last_err = Some(e),
            }
        }
        match self
            .rpc()
            .max_reduce::<U256>(
                &self.gateway().api_address,
                "eth_gasPrice",
                json!([]),
            )
            .await
        {
            Ok(price) => {
                best = Some(match best {
                    Some(b) if b > price => b,
                    _ => price,
                });
            }
            Err(e) => last_err = Some(e),
        }
        match best {
            Some(price) => Ok(price),
            None => {
                Err(last_err.unwrap_or(Error::NotFound("gas price")))
            }
        }
    }

    /// `eth_sendRawTransaction` fan-out: the extended list is told
    /// best-effort, the primary list authoritatively; one acceptance
    /// anywhere makes the broadcast a success.
    pub async fn broadcast_raw_transaction(
        &self,
        tx: &SignedTx,
    ) -> Result<()> {
        let raw = format!("0x{}", hex::encode(&tx.raw));
        let params = json!([raw]);
        let ext = &self.gateway().api_address_ext;
        let ext_accepted = if ext.is_empty() {
            false
        } else {
            self.rpc()
                .broadcast_any(ext, "eth_sendRawTransaction", params.clone())
                .await
                .is_ok()
        };
        let primary = self
            .rpc()
            .broadcast_any(
                &self.gateway().api_address,
                "eth_sendRawTransaction",
                params,
            )
            .await;
        let accepted = ext_accepted || primary.is_ok();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::TxBroadcast,
            tx_hash = %tx.tx_hash,
            accepted,
        );
        match primary {
            Ok(()) => Ok(()),
            Err(_) if ext_accepted => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<U256> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_chainId",
                json!([]),
                "chain id",
            )
            .await
    }

    /// `net_version`
    pub async fn network_id(&self) -> Result<u64> {
        let version: String = self
            .rpc()
            .first_success(
                &self.gateway().api_address,
                "net_version",
                json!([]),
                "net version",
            )
            .await?;
        version
            .parse::<u64>()
            .map_err(|_| Error::Generic("invalid net_version result"))
    }

    /// The chain id outbound transactions must be signed for: `eth_chainId`
    /// first, falling back to `net_version` when the gateway reports zero
    /// (some chains do).
    pub async fn get_signer_chain_id(&self) -> Result<u64> {
        let chain_id = self.chain_id().await?;
        if !chain_id.is_zero() {
            return Ok(chain_id.as_u64());
        }
        self.network_id().await
    }

    /// `eth_getCode`
    pub async fn get_code(&self, contract: Address) -> Result<Bytes> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getCode",
                json!([contract, "latest"]),
                "code",
            )
            .await
    }

    /// `eth_call`
    pub async fn call_contract(
        &self,
        contract: Address,
        data: Bytes,
        block: &str,
    ) -> Result<String> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_call",
                json!([{ "to": contract, "data": data }, block]),
                "call result",
            )
            .await
    }

    /// `eth_getBalance`
    pub async fn get_balance(&self, account: Address) -> Result<U256> {
        self.rpc()
            .first_success(
                &self.gateway().api_address,
                "eth_getBalance",
                json!([account, "latest"]),
                "balance",
            )
            .await
    }
}
