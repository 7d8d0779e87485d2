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

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the bridge relayer.
//!
//! ## Overview
//!
//! The configuration describes the two bridged chains, their gateway RPC
//! endpoint lists, the distributed threshold signing (DTS) cluster, and the
//! set of token pairs the relayer executes swaps for. Configuration is read
//! from `*.toml`/`*.json` files in a config directory, merged with
//! `BRIDGE_*` environment variables.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// DTS cluster and signer node configuration
pub mod dts;
/// Utils for processing configuration
pub mod utils;

use std::collections::HashMap;

use bridge_chain_traits::token::TokenPairConfig;
use bridge_relayer_types::rpc_url::RpcUrl;
use serde::{Deserialize, Serialize};

use dts::DtsConfig;

/// Default identifier stamped into the swap memos this relayer produces.
fn default_identifier() -> String {
    String::from("bridgeworks")
}

/// BridgeRelayerConfig is the configuration for the bridge relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeRelayerConfig {
    /// An identifier string for this relayer deployment.
    ///
    /// It is recorded with every swap this relayer executes so concurrent
    /// deployments can be told apart in storage.
    #[serde(default = "default_identifier")]
    pub identifier: String,
    /// The chain deposits are observed on.
    pub src_chain: ChainConfig,
    /// The chain outbound transactions are sent to.
    pub dest_chain: ChainConfig,
    /// Gateway endpoints of the source chain.
    pub src_gateway: GatewayConfig,
    /// Gateway endpoints of the destination chain.
    pub dest_gateway: GatewayConfig,
    /// The distributed threshold signing cluster.
    ///
    /// When absent, every configured token must carry a local private key.
    #[serde(default)]
    pub dts: Option<DtsConfig>,
    /// Configured token pairs, keyed by pair id.
    #[serde(default)]
    pub pairs: HashMap<String, TokenPairConfig>,
}

/// ChainConfig identifies one of the two bridged networks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    /// Human readable block chain name, e.g. `Ethereum`.
    pub block_chain: String,
    /// Network id: `mainnet`, `rinkeby` or `custom`.
    pub net_id: String,
}

/// GatewayConfig is the set of RPC endpoints used to reach a chain.
///
/// Neither list is ordered by preference; both are queried in declaration
/// order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Primary JSON-RPC endpoints.
    pub api_address: Vec<RpcUrl>,
    /// Optional extended endpoints, used for receipt lookups and
    /// best-effort broadcast fan-out.
    #[serde(default)]
    pub api_address_ext: Vec<RpcUrl>,
}

impl BridgeRelayerConfig {
    /// Makes sure that the config is valid, by going through the whole
    /// config and doing some basic checks. Any error here is fatal at
    /// startup.
    pub fn verify(&self) -> bridge_relayer_utils::Result<()> {
        if self.src_gateway.api_address.is_empty()
            || self.dest_gateway.api_address.is_empty()
        {
            return Err(bridge_relayer_utils::Error::EmptyUrls);
        }
        if let Some(dts) = &self.dts {
            dts.verify()?;
        }
        let dts_enabled =
            self.dts.as_ref().map(DtsConfig::enabled).unwrap_or(false);
        for (pair_id, pair) in &self.pairs {
            pair.verify(pair_id, dts_enabled)?;
        }
        Ok(())
    }
}
