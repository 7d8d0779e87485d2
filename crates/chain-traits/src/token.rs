use bridge_relayer_types::private_key::PrivateKey;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// TokenPairConfig is one configured (source token, destination token)
/// tuple the relayer bridges between.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TokenPairConfig {
    /// The token on the source chain.
    pub src_token: TokenConfig,
    /// The token on the destination chain.
    pub dest_token: TokenConfig,
}

/// TokenConfig describes one token endpoint of a pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TokenConfig {
    /// Human readable token name.
    pub name: String,
    /// Token ticker symbol.
    pub symbol: String,
    /// Number of decimals the token uses on its chain.
    pub decimals: u8,
    /// Token standard id, e.g. `ERC20`. Absent for native coins.
    #[serde(default)]
    pub id: Option<String>,
    /// The token contract, when the token is not the chain's native coin.
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// The sender address controlled by the signer cluster on this chain.
    pub dts_address: Address,
    /// The cluster public key that signs for [`Self::dts_address`].
    #[serde(default)]
    pub dts_pubkey: String,
    /// Where users deposit on the source chain.
    #[serde(default)]
    pub deposit_address: Option<Address>,
    /// The contract is a delegate (mintable proxy) contract.
    #[serde(default)]
    pub is_delegate_contract: bool,
    /// Temporarily stop executing swaps for this token.
    #[serde(default)]
    pub disable_swap: bool,
    /// A local signing key for [`Self::dts_address`].
    ///
    /// When present, outbound transactions are signed locally instead of
    /// going through the DTS cluster.
    #[serde(default, skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// Swap fee rate, as a fraction of the swapped value.
    #[serde(default)]
    pub swap_fee_rate: f64,
    /// Lower clamp for the swap fee, in destination token base units.
    #[serde(default)]
    pub min_swap_fee: u128,
    /// Upper clamp for the swap fee, in destination token base units.
    /// Zero means unclamped.
    #[serde(default)]
    pub max_swap_fee: u128,
    /// Gas limit for outbound transactions. Estimated when absent.
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

impl TokenConfig {
    /// Whether this token is an ERC-20 style contract token.
    pub fn is_erc20(&self) -> bool {
        self.id
            .as_deref()
            .map(|id| id.eq_ignore_ascii_case("erc20"))
            .unwrap_or(false)
    }

    fn verify(
        &self,
        pair_id: &str,
        is_src: bool,
        dts_enabled: bool,
    ) -> bridge_relayer_utils::Result<()> {
        let wrong = |reason: String| {
            bridge_relayer_utils::Error::WrongTokenConfig {
                pair_id: pair_id.to_string(),
                reason,
            }
        };
        // 18 decimals is a protocol constant for the native coin.
        if matches!(self.symbol.to_uppercase().as_str(), "ETH" | "FSN")
            && self.decimals != 18
        {
            return Err(wrong(format!(
                "invalid decimals for {}: want 18 but have {}",
                self.symbol, self.decimals
            )));
        }
        if self.is_erc20() && self.contract_address.is_none() {
            return Err(wrong(String::from(
                "erc20 token without a contract address",
            )));
        }
        if is_src && self.deposit_address.is_none() {
            return Err(wrong(String::from(
                "source token without a deposit address",
            )));
        }
        if self.private_key.is_none() {
            if !dts_enabled {
                return Err(wrong(String::from(
                    "no local private key and dts signing is disabled",
                )));
            }
            if self.dts_pubkey.is_empty() {
                return Err(wrong(String::from("empty dts pubkey")));
            }
        }
        Ok(())
    }
}

impl TokenPairConfig {
    /// Run startup verification over both token endpoints.
    pub fn verify(
        &self,
        pair_id: &str,
        dts_enabled: bool,
    ) -> bridge_relayer_utils::Result<()> {
        self.src_token.verify(pair_id, true, dts_enabled)?;
        self.dest_token.verify(pair_id, false, dts_enabled)?;
        Ok(())
    }

    /// The (from, to) token configs for the given direction.
    ///
    /// Swapin moves value from the source token to the destination token,
    /// swapout the other way around.
    pub fn tokens_by_direction(
        &self,
        is_swapin: bool,
    ) -> (&TokenConfig, &TokenConfig) {
        if is_swapin {
            (&self.src_token, &self.dest_token)
        } else {
            (&self.dest_token, &self.src_token)
        }
    }

    /// Computes the outbound value for an inbound deposit of `origin`
    /// base units: rescale between the two tokens' decimals, then take the
    /// configured fee, clamped into `[min_swap_fee, max_swap_fee]`.
    pub fn calc_swapped_value(&self, origin: U256, is_swapin: bool) -> U256 {
        let (from, to) = self.tokens_by_direction(is_swapin);
        let value = if to.decimals >= from.decimals {
            origin * U256::exp10(usize::from(to.decimals - from.decimals))
        } else {
            origin / U256::exp10(usize::from(from.decimals - to.decimals))
        };
        // fee rate is quantized to parts-per-million before the integer math
        let rate_ppm = (from.swap_fee_rate * 1_000_000.0).round() as u64;
        let mut fee = value * U256::from(rate_ppm) / U256::from(1_000_000u64);
        if fee < U256::from(from.min_swap_fee) {
            fee = U256::from(from.min_swap_fee);
        }
        if from.max_swap_fee > 0 && fee > U256::from(from.max_swap_fee) {
            fee = U256::from(from.max_swap_fee);
        }
        value.saturating_sub(fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(decimals: u8) -> TokenConfig {
        TokenConfig {
            name: String::from("Wrapped Coin"),
            symbol: String::from("WCOIN"),
            decimals,
            id: Some(String::from("ERC20")),
            contract_address: Some(Address::repeat_byte(0x11)),
            dts_address: Address::repeat_byte(0x22),
            dts_pubkey: String::from("04deadbeef"),
            deposit_address: Some(Address::repeat_byte(0x33)),
            is_delegate_contract: false,
            disable_swap: false,
            private_key: None,
            swap_fee_rate: 0.0,
            min_swap_fee: 0,
            max_swap_fee: 0,
            gas_limit: None,
        }
    }

    fn pair(src_decimals: u8, dest_decimals: u8) -> TokenPairConfig {
        TokenPairConfig {
            src_token: token(src_decimals),
            dest_token: token(dest_decimals),
        }
    }

    #[test]
    fn swapped_value_rescales_decimals() {
        let p = pair(8, 18);
        let out = p.calc_swapped_value(U256::from(5u64), true);
        assert_eq!(out, U256::from(5u64) * U256::exp10(10));
        // and back down for the reverse direction
        let back = p.calc_swapped_value(out, false);
        assert_eq!(back, U256::from(5u64));
    }

    #[test]
    fn swap_fee_is_clamped() {
        let mut p = pair(18, 18);
        p.src_token.swap_fee_rate = 0.001;
        p.src_token.min_swap_fee = 500;
        p.src_token.max_swap_fee = 2_000;
        // 0.1% of 1_000_000 is 1_000, inside the clamp window
        assert_eq!(
            p.calc_swapped_value(U256::from(1_000_000u64), true),
            U256::from(999_000u64)
        );
        // 0.1% of 100_000 is 100, raised to the min fee
        assert_eq!(
            p.calc_swapped_value(U256::from(100_000u64), true),
            U256::from(99_500u64)
        );
        // 0.1% of 10_000_000 is 10_000, capped at the max fee
        assert_eq!(
            p.calc_swapped_value(U256::from(10_000_000u64), true),
            U256::from(9_998_000u64)
        );
    }

    #[test]
    fn fee_never_underflows_the_value() {
        let mut p = pair(18, 18);
        p.src_token.min_swap_fee = 1_000;
        assert_eq!(p.calc_swapped_value(U256::from(10u64), true), U256::zero());
    }
}
