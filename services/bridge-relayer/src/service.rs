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

use bridge_chain_traits::ChainBridge;
use bridge_dts_client::DtsSigner;
use bridge_evm_chain::EthBridge;
use bridge_relayer_store::SwapNonceStore;
use bridge_relayer_utils::probe;
use bridge_swap_relay::dispatcher::spawn_swap_scan_jobs;
use bridge_swap_relay::{SwapDispatcher, SwapExecutor};

use crate::context::BridgeContext;

/// Starts all background services.
///
/// Connects both chain bridges (fatal on network mismatch), seeds the
/// nonce trackers from storage, freezes the dispatch queues and spawns
/// the producer sweeps. Does not block; everything runs on background
/// tasks until the context broadcasts shutdown.
pub async fn ignite(ctx: &BridgeContext) -> bridge_relayer_utils::Result<()> {
    let config = ctx.config();
    let pairs = Arc::new(config.pairs.clone());

    let dts = match &config.dts {
        Some(dts_config) if dts_config.enabled() => Some(Arc::new(
            DtsSigner::from_config(dts_config, ctx.notify_shutdown().clone())?,
        )),
        _ => None,
    };

    let src_bridge = Arc::new(
        EthBridge::connect(
            true,
            config.src_chain.clone(),
            config.src_gateway.clone(),
            pairs.clone(),
            dts.clone(),
        )
        .await?,
    );
    let dst_bridge = Arc::new(
        EthBridge::connect(
            false,
            config.dest_chain.clone(),
            config.dest_gateway.clone(),
            pairs.clone(),
            dts,
        )
        .await?,
    );

    let store = Arc::new(ctx.store().clone());
    let (swapin_nonces, swapout_nonces) = store.load_all_swap_nonces()?;
    if let Some(nonce_setter) = dst_bridge.nonce_setter() {
        nonce_setter.init_nonces(swapin_nonces);
    }
    if let Some(nonce_setter) = src_bridge.nonce_setter() {
        nonce_setter.init_nonces(swapout_nonces);
    }

    let executor = Arc::new(
        SwapExecutor::builder()
            .src_bridge(src_bridge)
            .dst_bridge(dst_bridge)
            .store(store)
            .pairs(pairs.clone())
            .identifier(config.identifier.clone())
            .build(),
    );
    let dispatcher = SwapDispatcher::start(executor.clone(), &pairs);
    for pair_id in pairs.keys() {
        spawn_swap_scan_jobs(
            executor.clone(),
            dispatcher.clone(),
            pair_id.clone(),
            ctx.notify_shutdown(),
        );
    }

    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        pairs = pairs.len(),
        ignited = true,
    );
    Ok(())
}
