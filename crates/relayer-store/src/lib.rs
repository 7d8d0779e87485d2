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

//! # Relayer Store Module 🕸️
//!
//! A module for managing the persisted swap state of the relayer.
//!
//! ## Overview
//!
//! The store keeps the swap records discovered by the deposit scanner, the
//! swap results the executor writes match transactions into, the per-pair
//! outbound nonce counters, and the address blacklist. The swap pipeline is
//! written against the traits in this module; [`SledStore`] is the
//! production backend and [`InMemoryStore`] backs the tests.

use std::collections::HashMap;

use bridge_chain_traits::SwapType;
use serde::{Deserialize, Serialize};

/// A module for managing in-memory storage of the relayer.
pub mod mem;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
#[cfg(feature = "sled")]
pub mod sled;

/// A store that uses [`sled`](https://sled.rs) as the backend.
#[cfg(feature = "sled")]
pub use self::sled::SledStore;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// The lifecycle status of a swap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum SwapStatus {
    /// Discovered and verified, waiting for the executor to pick it up.
    TxNotSwapped,
    /// The executor produced (or found) an outbound transaction for it.
    TxProcessed,
    /// A result record with no outbound transaction yet.
    MatchTxEmpty,
    /// Terminated because a participating address is blacklisted.
    SwapInBlacklist,
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SwapStatus::TxNotSwapped => "TxNotSwapped",
            SwapStatus::TxProcessed => "TxProcessed",
            SwapStatus::MatchTxEmpty => "MatchTxEmpty",
            SwapStatus::SwapInBlacklist => "SwapInBlacklist",
        };
        f.write_str(s)
    }
}

/// A verified inbound deposit, as registered by the deposit scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    /// The configured pair this swap belongs to.
    pub pair_id: String,
    /// The inbound transaction id.
    pub swap_id: String,
    /// The swap direction.
    pub swap_type: SwapType,
    /// The user supplied destination address.
    pub bind: String,
    /// The depositor address on the inbound chain.
    pub from: String,
    /// Scan status, drives the producer sweeps.
    pub status: SwapStatus,
    /// Unix seconds the record was registered at.
    pub timestamp: u64,
}

/// The execution side of a swap: what (if anything) was sent out for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    /// The configured pair this swap belongs to.
    pub pair_id: String,
    /// The inbound transaction id.
    pub swap_id: String,
    /// The swap direction.
    pub swap_type: SwapType,
    /// The user supplied destination address.
    pub bind: String,
    /// The depositor address on the inbound chain.
    pub from: String,
    /// The exact inbound amount, as a decimal string of base units.
    pub value: String,
    /// The outbound transaction hash. Empty until the swap is executed.
    pub swap_tx: String,
    /// The outbound amount after fees, as a decimal string of base units.
    pub swap_value: String,
    /// The nonce the outbound transaction was built with.
    pub swap_nonce: u64,
    /// The block the outbound transaction was included in, 0 while pending.
    pub swap_height: u64,
    /// Previous outbound transaction hashes, kept as a retry audit trail.
    pub old_swap_txs: Vec<String>,
    /// Result status, drives the dedup check.
    pub status: SwapStatus,
    /// Free form note, e.g. the reason a swap was terminated.
    pub memo: String,
    /// Unix seconds of the last update.
    pub timestamp: u64,
}

impl SwapResult {
    /// Whether this swap shows no sign of prior processing.
    ///
    /// Leaving this state requires updating `swap_tx` and `status`
    /// together, in one store write.
    pub fn is_unswapped(&self) -> bool {
        self.swap_tx.is_empty()
            && self.status == SwapStatus::MatchTxEmpty
            && self.swap_height == 0
            && self.old_swap_txs.is_empty()
    }
}

/// The match transaction the executor persists right before broadcasting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTx {
    /// The outbound transaction hash.
    pub swap_tx: String,
    /// The outbound amount after fees, decimal string of base units.
    pub swap_value: String,
    /// The swap direction.
    pub swap_type: SwapType,
    /// The nonce the outbound transaction was built with.
    pub swap_nonce: u64,
}

/// The canonical storage key of a swap: direction, pair, inbound tx and
/// bind address, all lowercased.
pub fn swap_key(
    swap_type: SwapType,
    pair_id: &str,
    swap_id: &str,
    bind: &str,
) -> String {
    format!(
        "{}:{}:{}:{}",
        swap_type,
        pair_id.to_lowercase(),
        swap_id.to_lowercase(),
        bind.to_lowercase()
    )
}

/// Current unix time in seconds.
pub(crate) fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Storage of discovered swaps, scanned by the producer sweeps.
pub trait SwapScanStore: Send + Sync {
    /// Register a newly discovered swap.
    fn register_swap(&self, swap: &SwapRecord) -> crate::Result<()>;

    /// Load one swap record.
    fn get_swap(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
    ) -> crate::Result<Option<SwapRecord>>;

    /// All swaps of a pair and direction in the given status, registered
    /// at or after `septime` (unix seconds).
    fn find_swaps_with_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        status: SwapStatus,
        septime: u64,
    ) -> crate::Result<Vec<SwapRecord>>;

    /// Update the scan status of a swap record.
    fn update_swap_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
        status: SwapStatus,
    ) -> crate::Result<()>;
}

/// Storage of swap results, the dedup source of truth.
pub trait SwapResultStore: Send + Sync {
    /// Register the result row for a discovered swap.
    fn register_swap_result(&self, result: &SwapResult) -> crate::Result<()>;

    /// Load one swap result.
    fn find_swap_result(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
    ) -> crate::Result<Option<SwapResult>>;

    /// Update the result status of a swap.
    fn update_swap_result_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
        status: SwapStatus,
        memo: &str,
    ) -> crate::Result<()>;

    /// Record the match transaction for a swap: sets `swap_tx`,
    /// `swap_value`, `swap_nonce` and moves the status to `TxProcessed`
    /// in one write. A previous `swap_tx` is pushed onto `old_swap_txs`.
    fn update_swap_result_match(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
        match_tx: &MatchTx,
    ) -> crate::Result<()>;
}

/// Storage of the per-pair outbound nonce counters.
pub trait SwapNonceStore: Send + Sync {
    /// Load all persisted nonce counters, split by direction:
    /// `(swapin nonces, swapout nonces)`, each keyed by pair id.
    fn load_all_swap_nonces(
        &self,
    ) -> crate::Result<(HashMap<String, u64>, HashMap<String, u64>)>;

    /// Persist the next-unused nonce for a pair and direction.
    fn set_swap_nonce(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        nonce: u64,
    ) -> crate::Result<()>;
}

/// Storage of blacklisted addresses.
pub trait BlacklistStore: Send + Sync {
    /// Whether the address is blacklisted for the pair.
    fn is_blacklisted(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<bool>;

    /// Add an address to the blacklist of a pair.
    fn add_to_blacklist(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<()>;

    /// Remove an address from the blacklist of a pair.
    fn remove_from_blacklist(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<()>;
}

pub use bridge_relayer_utils::{Error, Result};
