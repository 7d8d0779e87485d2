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

//! # DTS Client Module 🕸️
//!
//! Client for the distributed threshold signing (DTS) cluster.
//!
//! ## Overview
//!
//! The cluster jointly produces ECDSA signatures without any single member
//! holding the full key. This module submits sign requests through the
//! configured initiator nodes and polls for the resulting signature
//! shares. The cryptography itself lives in the cluster; we only speak its
//! RPC surface.

/// The cluster RPC surface.
pub mod rpc;
/// Sign request submission and polling.
pub mod sign;

pub use rpc::{DtsRpc, HttpDtsRpc, SignStatus};
pub use sign::{DtsSignOutcome, DtsSigner, SignerNode};
