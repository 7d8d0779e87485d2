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

//! Fan-out JSON-RPC 2.0 calls over a list of gateway endpoints.
//!
//! A single logical call is dispatched against every (or the first
//! responding) URL of an endpoint list and the per-URL outcomes are
//! reduced with one of three strategies:
//!
//! - [`RpcDispatcher::first_success`]: first non-error, non-null result
//!   wins. Lookups.
//! - [`RpcDispatcher::max_reduce`]: every URL is asked, the numerically
//!   greatest answer wins. Block numbers and pool nonces, where a lagging
//!   endpoint must not roll us backwards.
//! - [`RpcDispatcher::broadcast_any`]: every URL is told, one acceptance
//!   is enough. Raw transaction submission.
//!
//! There is no retry and no backoff inside a single call; resilience
//! beyond the fan-out itself belongs to the callers' outer loops.

/// Mocked endpoints for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_relayer_types::rpc_url::RpcUrl;
use bridge_relayer_utils::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// A JSON-RPC client fanning calls out over endpoint lists.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct RpcDispatcher {
    #[builder(default = Arc::new(reqwest::Client::new()))]
    client: Arc<reqwest::Client>,
    #[builder(default)]
    next_id: Arc<AtomicU64>,
}

impl Default for RpcDispatcher {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

impl RpcDispatcher {
    /// Posts one JSON-RPC request to one URL.
    ///
    /// Returns `Ok(None)` when the endpoint answered with a `null` result,
    /// i.e. it does not know the queried object.
    pub async fn post<R: DeserializeOwned>(
        &self,
        url: &RpcUrl,
        method: &str,
        params: &Value,
    ) -> Result<Option<R>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response: JsonRpcResponse = self
            .client
            .post(url.as_str())
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        if let Some(e) = response.error {
            return Err(Error::JsonRpc {
                code: e.code,
                message: e.message,
            });
        }
        match response.result {
            Some(v) if !v.is_null() => Ok(Some(serde_json::from_value(v)?)),
            _ => Ok(None),
        }
    }

    /// Posts to one URL and requires a non-null result.
    pub async fn call<R: DeserializeOwned>(
        &self,
        url: &RpcUrl,
        method: &str,
        params: &Value,
        what: &'static str,
    ) -> Result<R> {
        self.post(url, method, params)
            .await?
            .ok_or(Error::NotFound(what))
    }

    /// Iterate the URLs in declaration order and return the first
    /// non-error, non-null result.
    ///
    /// If no URL succeeds the last transport error is returned; if every
    /// URL succeeded but answered `null`, `NotFound(what)` is returned.
    pub async fn first_success<R: DeserializeOwned>(
        &self,
        urls: &[RpcUrl],
        method: &str,
        params: Value,
        what: &'static str,
    ) -> Result<R> {
        if urls.is_empty() {
            return Err(Error::EmptyUrls);
        }
        let mut last_err = None;
        for url in urls {
            match self.post::<R>(url, method, &params).await {
                Ok(Some(result)) => return Ok(result),
                Ok(None) => continue,
                Err(e) => {
                    tracing::trace!(%url, method, error = %e, "rpc call failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(Error::NotFound(what)))
    }

    /// Query every URL and return the numerically greatest answer.
    ///
    /// Errors only when every URL failed.
    pub async fn max_reduce<R>(
        &self,
        urls: &[RpcUrl],
        method: &str,
        params: Value,
    ) -> Result<R>
    where
        R: DeserializeOwned + Ord,
    {
        if urls.is_empty() {
            return Err(Error::EmptyUrls);
        }
        let mut best: Option<R> = None;
        let mut last_err = None;
        for url in urls {
            match self.post::<R>(url, method, &params).await {
                Ok(Some(value)) => {
                    best = Some(match best.take() {
                        Some(b) if b >= value => b,
                        _ => value,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::trace!(%url, method, error = %e, "rpc call failed");
                    last_err = Some(e);
                }
            }
        }
        match best {
            Some(value) => Ok(value),
            None => Err(last_err.unwrap_or(Error::NotFound("result"))),
        }
    }

    /// Send to every URL; succeed if any URL accepted.
    pub async fn broadcast_any(
        &self,
        urls: &[RpcUrl],
        method: &str,
        params: Value,
    ) -> Result<()> {
        if urls.is_empty() {
            return Err(Error::EmptyUrls);
        }
        let mut success = false;
        let mut last_err = None;
        for url in urls {
            match self.post::<Value>(url, method, &params).await {
                Ok(_) => {
                    tracing::trace!(%url, method, "broadcast accepted");
                    success = true;
                }
                Err(e) => {
                    tracing::trace!(%url, method, error = %e, "broadcast failed");
                    last_err = Some(e);
                }
            }
        }
        if success {
            Ok(())
        } else {
            Err(last_err.unwrap_or(Error::Generic("broadcast failed")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use ethers::types::U64;

    #[tokio::test]
    async fn first_success_returns_first_non_empty_and_stops() {
        let endpoints = [
            spawn(Behavior::Error),
            spawn(Behavior::Result(serde_json::json!("0x2"))),
            spawn(Behavior::Result(serde_json::json!("0x3"))),
        ];
        wait_for_startup().await;
        let urls: Vec<_> = endpoints.iter().map(|e| e.url.clone()).collect();
        let dispatcher = RpcDispatcher::default();
        let result: String = dispatcher
            .first_success(&urls, "eth_blockNumber", serde_json::json!([]), "block")
            .await
            .unwrap();
        assert_eq!(result, "0x2");
        // the third endpoint must never have been asked
        assert_eq!(endpoints[2].calls(), 0);
    }

    #[tokio::test]
    async fn first_success_all_null_is_not_found() {
        let endpoints = [spawn(Behavior::Null), spawn(Behavior::Null)];
        wait_for_startup().await;
        let urls: Vec<_> = endpoints.iter().map(|e| e.url.clone()).collect();
        let dispatcher = RpcDispatcher::default();
        let err = dispatcher
            .first_success::<Value>(
                &urls,
                "eth_getTransactionByHash",
                serde_json::json!(["0xdead"]),
                "tx",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("tx")));
    }

    #[tokio::test]
    async fn empty_url_list_is_rejected_up_front() {
        let dispatcher = RpcDispatcher::default();
        let err = dispatcher
            .first_success::<Value>(&[], "eth_chainId", serde_json::json!([]), "chain id")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyUrls));
    }

    #[tokio::test]
    async fn max_reduce_takes_the_greatest_success() {
        let endpoints = [
            spawn(Behavior::Result(serde_json::json!("0x10"))),
            spawn(Behavior::Error),
            spawn(Behavior::Result(serde_json::json!("0x20"))),
        ];
        wait_for_startup().await;
        let urls: Vec<_> = endpoints.iter().map(|e| e.url.clone()).collect();
        let dispatcher = RpcDispatcher::default();
        let best: U64 = dispatcher
            .max_reduce(&urls, "eth_blockNumber", serde_json::json!([]))
            .await
            .unwrap();
        assert_eq!(best, U64::from(0x20));
    }

    #[tokio::test]
    async fn max_reduce_fails_only_when_every_url_failed() {
        let endpoints = [spawn(Behavior::Error), spawn(Behavior::Error)];
        wait_for_startup().await;
        let urls: Vec<_> = endpoints.iter().map(|e| e.url.clone()).collect();
        let dispatcher = RpcDispatcher::default();
        let err = dispatcher
            .max_reduce::<U64>(&urls, "eth_blockNumber", serde_json::json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JsonRpc { .. }));
    }

    #[tokio::test]
    async fn broadcast_any_succeeds_on_a_single_acceptance() {
        let endpoints = [
            spawn(Behavior::Error),
            spawn(Behavior::Result(serde_json::json!("0xhash"))),
            spawn(Behavior::Error),
        ];
        wait_for_startup().await;
        let urls: Vec<_> = endpoints.iter().map(|e| e.url.clone()).collect();
        let dispatcher = RpcDispatcher::default();
        dispatcher
            .broadcast_any(
                &urls,
                "eth_sendRawTransaction",
                serde_json::json!(["0xf86b..."]),
            )
            .await
            .unwrap();
        // every endpoint is still told, even after a success
        for endpoint in &endpoints {
            assert_eq!(endpoint.calls(), 1);
        }
    }

    #[tokio::test]
    async fn broadcast_any_propagates_the_last_error() {
        let endpoints = [spawn(Behavior::Error), spawn(Behavior::Error)];
        wait_for_startup().await;
        let urls: Vec<_> = endpoints.iter().map(|e| e.url.clone()).collect();
        let dispatcher = RpcDispatcher::default();
        let err = dispatcher
            .broadcast_any(
                &urls,
                "eth_sendRawTransaction",
                serde_json::json!(["0xf86b..."]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JsonRpc { .. }));
    }
}
