use async_trait::async_trait;
use bridge_relayer_types::rpc_url::RpcUrl;
use bridge_rpc_dispatch::RpcDispatcher;
use bridge_relayer_utils::{Error, Result};
use ethers::types::Address;
use serde::Deserialize;
use serde_json::Value;

/// The answer to a sign status query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignStatus {
    /// Cluster-side status string: `Pending`, `Success`, `Failure`, `Timeout`.
    #[serde(rename = "Status", default)]
    pub status: String,
    /// The produced signature components, one `r||s||v` hex string per
    /// requested message hash. Empty until the cluster is done.
    #[serde(rename = "Rsv", default)]
    pub rsv: Vec<String>,
    /// Cluster-side error detail, when there is one.
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

/// The RPC surface an initiator node exposes.
#[async_trait]
pub trait DtsRpc: Send + Sync + 'static {
    /// Liveness probe.
    async fn get_enode(&self, url: &RpcUrl) -> Result<String>;

    /// The signer-side account nonce for the next sign request envelope.
    async fn get_sign_nonce(&self, user: Address, url: &RpcUrl)
        -> Result<u64>;

    /// Submit a sign request envelope. Returns the cluster key id of the
    /// accepted request.
    async fn sign(&self, raw_tx: &str, url: &RpcUrl) -> Result<String>;

    /// Query the progress of an accepted sign request.
    ///
    /// Terminal cluster failures surface as
    /// [`Error::GetSignStatusFailed`] / [`Error::GetSignStatusTimeout`].
    async fn get_sign_status(
        &self,
        key_id: &str,
        url: &RpcUrl,
    ) -> Result<SignStatus>;
}

/// [`DtsRpc`] over plain JSON-RPC.
#[derive(Debug, Clone, Default, typed_builder::TypedBuilder)]
pub struct HttpDtsRpc {
    #[builder(default)]
    dispatcher: RpcDispatcher,
}

/// Signer nodes hand nonces out as decimal numbers, decimal strings or
/// `0x` hex strings depending on their version.
fn parse_nonce(value: Value) -> Result<u64> {
    match value {
        Value::Number(n) => {
            n.as_u64().ok_or(Error::Generic("sign nonce out of range"))
        }
        Value::String(s) => {
            let parsed = if let Some(hex) = s.strip_prefix("0x") {
                u64::from_str_radix(hex, 16)
            } else {
                s.parse::<u64>()
            };
            parsed.map_err(|_| Error::Generic("unparsable sign nonce"))
        }
        _ => Err(Error::Generic("unexpected sign nonce shape")),
    }
}

#[async_trait]
impl DtsRpc for HttpDtsRpc {
    async fn get_enode(&self, url: &RpcUrl) -> Result<String> {
        self.dispatcher
            .call(url, "dts_getEnode", &serde_json::json!([]), "enode")
            .await
    }

    async fn get_sign_nonce(
        &self,
        user: Address,
        url: &RpcUrl,
    ) -> Result<u64> {
        let value: Value = self
            .dispatcher
            .call(
                url,
                "dts_getSignNonce",
                &serde_json::json!([format!("{user:?}")]),
                "sign nonce",
            )
            .await?;
        parse_nonce(value)
    }

    async fn sign(&self, raw_tx: &str, url: &RpcUrl) -> Result<String> {
        self.dispatcher
            .call(url, "dts_sign", &serde_json::json!([raw_tx]), "key id")
            .await
    }

    async fn get_sign_status(
        &self,
        key_id: &str,
        url: &RpcUrl,
    ) -> Result<SignStatus> {
        let status: SignStatus = self
            .dispatcher
            .call(
                url,
                "dts_getSignStatus",
                &serde_json::json!([key_id]),
                "sign status",
            )
            .await?;
        match status.status.as_str() {
            "Failure" => Err(Error::GetSignStatusFailed),
            "Timeout" => Err(Error::GetSignStatusTimeout),
            _ => Ok(status),
        }
    }
}
