use bridge_relayer_types::{private_key::PrivateKey, rpc_url::RpcUrl};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// DtsConfig describes the distributed threshold signing cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DtsConfig {
    /// Globally disable DTS signing without removing the section.
    #[serde(default)]
    pub disable: bool,
    /// The fixed address sign-request envelope transactions are sent to.
    pub to_address: Address,
    /// Chain id the envelope transactions are signed for.
    pub chain_id: u64,
    /// The signing threshold, e.g. `2/3`.
    pub threshold: String,
    /// The cluster key management mode.
    pub mode: String,
    /// The initiator nodes this relayer may submit sign requests through.
    pub initiators: Vec<SignerNodeConfig>,
}

/// SignerNodeConfig is one initiator node of the DTS cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SignerNodeConfig {
    /// The node's RPC endpoint.
    #[serde(skip_serializing)]
    pub rpc_url: RpcUrl,
    /// The account this relayer is registered as on the node.
    pub user_address: Address,
    /// The key that signs sign-request envelopes for `user_address`.
    #[serde(skip_serializing)]
    pub key: PrivateKey,
    /// Ordered list of signing sub-group identifiers on this node.
    pub sign_groups: Vec<String>,
}

impl DtsConfig {
    /// Basic sanity checks, fatal at startup.
    pub fn verify(&self) -> bridge_relayer_utils::Result<()> {
        if self.disable {
            return Ok(());
        }
        if self.initiators.is_empty() {
            return Err(bridge_relayer_utils::Error::Generic(
                "dts enabled but no initiator nodes configured",
            ));
        }
        for node in &self.initiators {
            if node.sign_groups.is_empty() {
                return Err(bridge_relayer_utils::Error::Generic(
                    "dts initiator node without sign groups",
                ));
            }
        }
        Ok(())
    }

    /// Whether DTS signing is usable.
    pub fn enabled(&self) -> bool {
        !self.disable && !self.initiators.is_empty()
    }
}
