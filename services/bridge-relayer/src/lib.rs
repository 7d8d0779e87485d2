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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Bridge Relayer 🕸️
//!
//! The cross-chain bridge coordinator daemon: wires the configured chain
//! bridges, the signer cluster client and the swap pipeline together and
//! keeps them running until the process is told to stop.

/// Shared runtime context (config, store, shutdown signal).
pub mod context;
/// Background service ignition.
pub mod service;
