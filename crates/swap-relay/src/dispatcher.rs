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
    BlacklistStore, SwapNonceStore, SwapResultStore, SwapScanStore,
    SwapStatus,
};
use bridge_relayer_utils::{probe, Error, Result};
use ethers::types::Address;
use tokio::sync::{broadcast, mpsc};

use crate::executor::SwapExecutor;
use crate::{
    MAX_DO_SWAP_LIFETIME, REST_INTERVAL_IN_DO_SWAP_JOB, SWAP_CHAN_SIZE,
};

/// Routes dispatched swaps into per-destination-address bounded queues.
///
/// Both maps are built once, when the dispatcher starts, from the full
/// pair set; after that they are only read. Exactly one consumer task
/// drains each queue, which is what serializes nonce assignment per
/// sender account.
pub struct SwapDispatcher {
    swapin_task_channels: HashMap<String, mpsc::Sender<BuildTxArgs>>,
    swapout_task_channels: HashMap<String, mpsc::Sender<BuildTxArgs>>,
}

fn queue_key(address: Address) -> String {
    format!("{address:?}")
}

impl SwapDispatcher {
    /// Builds the queue maps for every configured pair and spawns one
    /// consumer task per queue.
    pub fn start<B, S>(
        executor: Arc<SwapExecutor<B, S>>,
        pairs: &HashMap<String, TokenPairConfig>,
    ) -> Arc<Self>
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
        let mut swapin_task_channels = HashMap::new();
        let mut swapout_task_channels = HashMap::new();
        for pair in pairs.values() {
            swapin_task_channels
                .entry(queue_key(pair.dest_token.dts_address))
                .or_insert_with(|| spawn_consumer(executor.clone()));
            swapout_task_channels
                .entry(queue_key(pair.src_token.dts_address))
                .or_insert_with(|| spawn_consumer(executor.clone()));
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::SwapQueue,
            swapin_queues = swapin_task_channels.len(),
            swapout_queues = swapout_task_channels.len(),
            starting = true,
        );
        Arc::new(Self {
            swapin_task_channels,
            swapout_task_channels,
        })
    }

    /// Route the args to the queue of their destination DTS address,
    /// waiting when that queue is full.
    pub async fn dispatch(&self, args: BuildTxArgs) -> Result<()> {
        let from = queue_key(args.from);
        let channels = match args.swap_type {
            SwapType::Swapin => &self.swapin_task_channels,
            SwapType::Swapout => &self.swapout_task_channels,
        };
        let channel =
            channels.get(&from).ok_or_else(|| Error::NoSwapChannel {
                swap_type: args.swap_type.as_str(),
                address: from.clone(),
            })?;
        let pair_id = args.pair_id.clone();
        let swap_id = args.swap_id.clone();
        channel
            .send(args)
            .await
            .map_err(|_| Error::SwapChannelClosed)?;
        tracing::info!(%pair_id, %swap_id, address = %from, "dispatch swap task");
        Ok(())
    }
}

fn spawn_consumer<B, S>(
    executor: Arc<SwapExecutor<B, S>>,
) -> mpsc::Sender<BuildTxArgs>
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
    let (sender, receiver) = mpsc::channel(SWAP_CHAN_SIZE);
    tokio::spawn(process_swap_task(executor, receiver));
    sender
}

/// The single consumer loop of one per-address queue.
async fn process_swap_task<B, S>(
    executor: Arc<SwapExecutor<B, S>>,
    mut receiver: mpsc::Receiver<BuildTxArgs>,
) where
    B: ChainBridge,
    S: SwapScanStore
        + SwapResultStore
        + SwapNonceStore
        + BlacklistStore
        + Send
        + Sync
        + 'static,
{
    while let Some(args) = receiver.recv().await {
        match executor.do_swap(&args).await {
            Ok(()) | Err(Error::AlreadySwapped) => {}
            Err(e) => {
                tracing::error!(
                    pair_id = %args.pair_id,
                    swap_id = %args.swap_id,
                    swap_type = %args.swap_type,
                    value = %args.origin_value,
                    error = %e,
                    "process swap task failed",
                );
            }
        }
    }
}

/// Spawns the two producer tasks of a pair, one per direction. Each task
/// sweeps storage for unswapped records and feeds them through the
/// dispatcher until shutdown.
pub fn spawn_swap_scan_jobs<B, S>(
    executor: Arc<SwapExecutor<B, S>>,
    dispatcher: Arc<SwapDispatcher>,
    pair_id: String,
    notify_shutdown: &broadcast::Sender<()>,
) where
    B: ChainBridge,
    S: SwapScanStore
        + SwapResultStore
        + SwapNonceStore
        + BlacklistStore
        + Send
        + Sync
        + 'static,
{
    for swap_type in [SwapType::Swapin, SwapType::Swapout] {
        tokio::spawn(swap_scan_job(
            executor.clone(),
            dispatcher.clone(),
            pair_id.clone(),
            swap_type,
            notify_shutdown.subscribe(),
        ));
    }
}

async fn swap_scan_job<B, S>(
    executor: Arc<SwapExecutor<B, S>>,
    dispatcher: Arc<SwapDispatcher>,
    pair_id: String,
    swap_type: SwapType,
    mut shutdown: broadcast::Receiver<()>,
) where
    B: ChainBridge,
    S: SwapScanStore
        + SwapResultStore
        + SwapNonceStore
        + BlacklistStore
        + Send
        + Sync
        + 'static,
{
    tracing::info!(%pair_id, %swap_type, "start swap scan job");
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::SwapScan,
        pair_id = %pair_id,
        swap_type = %swap_type,
        starting = true,
    );
    loop {
        let septime = unix_now().saturating_sub(MAX_DO_SWAP_LIFETIME.as_secs());
        match executor.store().find_swaps_with_status(
            swap_type,
            &pair_id,
            SwapStatus::TxNotSwapped,
            septime,
        ) {
            Ok(swaps) => {
                if !swaps.is_empty() {
                    tracing::info!(
                        %pair_id,
                        %swap_type,
                        count = swaps.len(),
                        "found swaps to swap",
                    );
                }
                for swap in swaps {
                    match executor.process_swap(&swap).await {
                        Ok(Some(args)) => {
                            if let Err(e) = dispatcher.dispatch(args).await {
                                tracing::error!(
                                    swap_id = %swap.swap_id,
                                    error = %e,
                                    "dispatch swap failed",
                                );
                            }
                        }
                        Ok(None) | Err(Error::AlreadySwapped) => {}
                        Err(e) => {
                            tracing::error!(
                                %pair_id,
                                swap_id = %swap.swap_id,
                                bind = %swap.bind,
                                error = %e,
                                "process swap error",
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(%pair_id, %swap_type, error = %e, "find swaps error");
            }
        }
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!(%pair_id, %swap_type, "swap scan job stopped");
                return;
            }
            _ = tokio::time::sleep(REST_INTERVAL_IN_DO_SWAP_JOB) => {}
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
