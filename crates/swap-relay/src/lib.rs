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

//! # Swap Relay Module 🕸️
//!
//! The swap execution pipeline: producer sweeps find verified deposits in
//! storage, route them through bounded per-destination-address queues, and
//! a single consumer per queue executes them end to end (dedup, gate,
//! build, sign, persist, broadcast, advance nonce).
//!
//! Nonces on the target chain must be assigned strictly increasing per
//! sender account. One consumer task per destination address gives that
//! ordering without any locking; queues for distinct addresses run
//! concurrently.

/// Per-address dispatch queues and the storage sweep tasks.
pub mod dispatcher;
/// The end-to-end execution of one swap.
pub mod executor;

pub use dispatcher::SwapDispatcher;
pub use executor::SwapExecutor;

use std::time::Duration;

/// Capacity of one per-address dispatch queue.
pub const SWAP_CHAN_SIZE: usize = 10;
/// Swaps older than this are left for operator review instead of being
/// retried by the sweeps.
pub const MAX_DO_SWAP_LIFETIME: Duration = Duration::from_secs(3600);
/// Rest between two storage sweeps of one producer task.
pub const REST_INTERVAL_IN_DO_SWAP_JOB: Duration = Duration::from_secs(10);
