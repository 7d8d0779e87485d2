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

use std::collections::HashMap;
use std::sync::Arc;

use bridge_chain_traits::token::TokenPairConfig;
use bridge_chain_traits::{BuildTxArgs, ChainBridge, SwapType};
use bridge_relayer_store::{
    BlacklistStore, MatchTx, SwapNonceStore, SwapRecord, SwapResult,
    SwapResultStore, SwapScanStore, SwapStatus,
};
use bridge_relayer_utils::{Error, Result};
use ethers::types::U256;

/// Executes swaps end to end against the two chain bridges.
///
/// The executor itself is stateless between swaps; exactly-once behavior
/// comes from the dedup check against storage and from the per-address
/// consumer serialization in the dispatcher.
#[derive(typed_builder::TypedBuilder)]
pub struct SwapExecutor<B, S> {
    src_bridge: Arc<B>,
    dst_bridge: Arc<B>,
    store: Arc<S>,
    pairs: Arc<HashMap<String, TokenPairConfig>>,
    #[builder(setter(into))]
    identifier: String,
}

impl<B, S> SwapExecutor<B, S>
where
    B: ChainBridge,
    S: SwapScanStore
        + SwapResultStore
        + SwapNonceStore
        + BlacklistStore
        + Send
        + Sync
        + 'static,
{
    /// The store this executor reads and writes swap state through.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The bridge outbound transactions of this direction go to.
    ///
    /// A swapin releases on the destination chain, a swapout releases
    /// back on the source chain.
    fn result_bridge(&self, swap_type: SwapType) -> &Arc<B> {
        match swap_type {
            SwapType::Swapin => &self.dst_bridge,
            SwapType::Swapout => &self.src_bridge,
        }
    }

    /// Pre-dispatch processing of a scanned swap record: dedup check and
    /// gating. Returns the dispatchable build args, or `None` when the
    /// swap is to be skipped.
    pub async fn process_swap(
        &self,
        swap: &SwapRecord,
    ) -> Result<Option<BuildTxArgs>> {
        let res = self
            .store
            .find_swap_result(
                swap.swap_type,
                &swap.pair_id,
                &swap.swap_id,
                &swap.bind,
            )?
            .ok_or(Error::NotFound("swap result"))?;
        self.prevent_double_swap(&res)?;

        tracing::info!(
            pair_id = %swap.pair_id,
            swap_id = %swap.swap_id,
            bind = %swap.bind,
            swap_type = %swap.swap_type,
            value = %res.value,
            "start process swap",
        );

        let Some(pair) = self.pairs.get(&swap.pair_id) else {
            tracing::trace!(pair_id = %swap.pair_id, "swap is not configured");
            return Ok(None);
        };
        let is_swapin = swap.swap_type.is_swapin();
        let (from_token, to_token) = pair.tokens_by_direction(is_swapin);
        if from_token.disable_swap {
            tracing::trace!(pair_id = %swap.pair_id, "swap is disabled");
            return Ok(None);
        }
        if self.is_swap_in_blacklist(&res)? {
            tracing::trace!(
                swap_id = %swap.swap_id,
                bind = %swap.bind,
                "address is in blacklist",
            );
            self.store.update_swap_status(
                swap.swap_type,
                &swap.pair_id,
                &swap.swap_id,
                &swap.bind,
                SwapStatus::SwapInBlacklist,
            )?;
            return Ok(None);
        }

        let origin_value = U256::from_dec_str(&res.value)
            .map_err(|_| Error::Generic("wrong swap value"))?;
        Ok(Some(BuildTxArgs {
            identifier: self.identifier.clone(),
            pair_id: swap.pair_id.clone(),
            swap_id: swap.swap_id.clone(),
            swap_type: swap.swap_type,
            bind: swap.bind.clone(),
            from: to_token.dts_address,
            origin_value,
        }))
    }

    /// Executes one dispatched swap: dedup again (the queue may hold a
    /// duplicate), build, sign, persist the match record, broadcast, and
    /// advance the nonce on success.
    pub async fn do_swap(&self, args: &BuildTxArgs) -> Result<()> {
        let bridge = self.result_bridge(args.swap_type);
        let res = self
            .store
            .find_swap_result(
                args.swap_type,
                &args.pair_id,
                &args.swap_id,
                &args.bind,
            )?
            .ok_or(Error::NotFound("swap result"))?;
        self.prevent_double_swap(&res)?;

        tracing::info!(
            pair_id = %args.pair_id,
            swap_id = %args.swap_id,
            bind = %args.bind,
            value = %args.origin_value,
            "start to do swap",
        );

        let raw_tx = match bridge.build_raw_transaction(args).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!(
                    swap_id = %args.swap_id,
                    error = %e,
                    "build tx failed",
                );
                return Err(e);
            }
        };
        let swap_nonce =
            raw_tx.nonce().map(|n| n.as_u64()).unwrap_or_default();

        let token = bridge
            .token_config(&args.pair_id)
            .ok_or_else(|| Error::TokenPairNotFound(args.pair_id.clone()))?;
        let signed = if token.private_key.is_some() {
            bridge.sign_transaction(&raw_tx, &args.pair_id).await
        } else {
            bridge.dts_sign_transaction(&raw_tx, args).await
        };
        let signed = match signed {
            Ok(signed) => signed,
            Err(e) => {
                tracing::error!(
                    swap_id = %args.swap_id,
                    error = %e,
                    "sign tx failed",
                );
                return Err(e);
            }
        };

        // update the database before broadcasting; a crash in between
        // must never lose track of an in-flight transaction
        let pair = self
            .pairs
            .get(&args.pair_id)
            .ok_or_else(|| Error::TokenPairNotFound(args.pair_id.clone()))?;
        let swap_value = pair
            .calc_swapped_value(args.origin_value, args.swap_type.is_swapin());
        let match_tx = MatchTx {
            swap_tx: format!("{:?}", signed.tx_hash),
            swap_value: swap_value.to_string(),
            swap_type: args.swap_type,
            swap_nonce,
        };
        self.store.update_swap_result_match(
            args.swap_type,
            &args.pair_id,
            &args.swap_id,
            &args.bind,
            &match_tx,
        )?;
        self.store.update_swap_status(
            args.swap_type,
            &args.pair_id,
            &args.swap_id,
            &args.bind,
            SwapStatus::TxProcessed,
        )?;

        let sent = bridge.send_signed_transaction(&signed).await;
        match &sent {
            Ok(()) => {
                if let Some(nonce_setter) = bridge.nonce_setter() {
                    nonce_setter.set_nonce(&args.pair_id, swap_nonce + 1);
                }
                self.store.set_swap_nonce(
                    args.swap_type,
                    &args.pair_id,
                    swap_nonce + 1,
                )?;
            }
            Err(e) => {
                // the reserved nonce is left as a gap on purpose; freeing
                // it here could replay against an accepted-but-unseen tx
                tracing::error!(
                    swap_id = %args.swap_id,
                    swap_tx = %match_tx.swap_tx,
                    error = %e,
                    "send signed tx failed",
                );
            }
        }
        sent
    }

    /// Any sign of prior processing marks the record processed and stops
    /// this execution with the non-fatal [`Error::AlreadySwapped`].
    fn prevent_double_swap(&self, res: &SwapResult) -> Result<()> {
        if !res.is_unswapped() {
            self.store.update_swap_status(
                res.swap_type,
                &res.pair_id,
                &res.swap_id,
                &res.bind,
                SwapStatus::TxProcessed,
            )?;
            return Err(Error::AlreadySwapped);
        }
        Ok(())
    }

    fn is_swap_in_blacklist(&self, res: &SwapResult) -> Result<bool> {
        if self.store.is_blacklisted(&res.from, &res.pair_id)? {
            return Ok(true);
        }
        if res.bind != res.from {
            return self.store.is_blacklisted(&res.bind, &res.pair_id);
        }
        Ok(false)
    }
}
