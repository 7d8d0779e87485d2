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

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "bridge_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the Relayer changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Producer sweeps over storage looking for unswapped records.
    #[display(fmt = "swap_scan")]
    SwapScan,
    /// Per-address swap dispatch queue state.
    #[display(fmt = "swap_queue")]
    SwapQueue,
    /// Distributed threshold signing progress.
    #[display(fmt = "dts_sign")]
    DtsSign,
    /// Outbound transaction broadcast state.
    #[display(fmt = "tx_broadcast")]
    TxBroadcast,
    /// When the relayer will retry to do something.
    #[display(fmt = "retry")]
    Retry,
}
