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

//! # Relayer Utils Module 🕸️
//!
//! Common error types, retry policies and probe targets shared by every
//! crate in the bridge relayer workspace.

/// A module used for debugging relayer lifecycle, queue and signing state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// An enum of all possible errors that could be encountered during the
/// execution of the bridge relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP transport error.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Sled database error.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWallet(#[from] ethers::signers::WalletError),
    /// Signature recovery errors.
    #[error(transparent)]
    EthersSignature(#[from] ethers::types::SignatureError),
    /// Hex decoding error.
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// The remote endpoint answered with a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// The error code from the JSON-RPC error object.
        code: i64,
        /// The error message from the JSON-RPC error object.
        message: String,
    },
    /// The configured endpoint list is empty.
    #[error("empty URLs")]
    EmptyUrls,
    /// Every endpoint answered, but none of them knows the queried object.
    #[error("{} not found", _0)]
    NotFound(&'static str),
    /// The configured network name is not one we recognize.
    #[error("unsupported network: {}", _0)]
    UnsupportedNetwork(String),
    /// The chain id reported by the gateway does not match the configured
    /// network.
    #[error("gateway chain id {chain_id} is not {net_id}")]
    ChainIdMismatch {
        /// The configured network name.
        net_id: String,
        /// The chain id the gateway reported.
        chain_id: u64,
    },
    /// A token pair referenced by a swap is not configured.
    #[error("token pair not found: {}", _0)]
    TokenPairNotFound(String),
    /// A token config failed its startup verification.
    #[error("wrong token config for pair {pair_id}: {reason}")]
    WrongTokenConfig {
        /// The pair the token belongs to.
        pair_id: String,
        /// What exactly is wrong with it.
        reason: String,
    },
    /// Distributed threshold signing is disabled in the config.
    #[error("dts sign is disabled")]
    DtsDisabled,
    /// A sign request was issued with an empty cluster public key.
    #[error("dts sign with empty public key")]
    EmptySignPubkey,
    /// The signer cluster reported the sign request as failed.
    #[error("get sign status failed")]
    GetSignStatusFailed,
    /// The signer cluster reported the sign request as timed out.
    #[error("get sign status timeout")]
    GetSignStatusTimeout,
    /// Our own polling deadline for a sign attempt fired.
    #[error("sign timer timeout")]
    SignTimerTimeout,
    /// The signature material returned by the cluster is unusable.
    #[error("invalid signature: {}", _0)]
    InvalidSignature(String),
    /// Sentinel: the swap already has an outbound transaction.
    ///
    /// Callers treat this as success.
    #[error("already swapped")]
    AlreadySwapped,
    /// No dispatch queue exists for the given destination address.
    #[error("no {swap_type} task channel for dts address '{address}'")]
    NoSwapChannel {
        /// The direction of the queue that was looked up.
        swap_type: &'static str,
        /// The (lowercased) destination dts address.
        address: String,
    },
    /// The consumer side of a dispatch queue is gone.
    #[error("swap task channel closed")]
    SwapChannelClosed,
    /// A token config that should carry a local signing key does not.
    #[error("missing required private key")]
    MissingPrivateKey,
    /// An on-chain address failed validation.
    #[error("invalid address: {}", _0)]
    InvalidAddress(String),
    /// The relayer is shutting down.
    #[error("shutting down")]
    ShuttingDown,
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
}

/// A type alias for the result of the bridge relayer, that uses the
/// [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;
