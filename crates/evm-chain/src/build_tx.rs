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

use bridge_chain_traits::BuildTxArgs;
use bridge_relayer_utils::{Error, Result};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};

use crate::EthBridge;

const DEFAULT_GAS_LIMIT: u64 = 90_000;

// transfer(address,uint256)
const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
// mint(address,uint256)
const MINT_SELECTOR: [u8; 4] = [0x40, 0xc1, 0x0f, 0x19];

impl EthBridge {
    /// Assembles the unsigned outbound transaction for a swap: payload per
    /// the token config flags, value per the pair's fee rules, nonce from
    /// the tracker, gas price from both endpoint lists.
    pub(crate) async fn build_tx(
        &self,
        args: &BuildTxArgs,
    ) -> Result<TypedTransaction> {
        let pair = self.pair_config(&args.pair_id)?;
        let (_, token) = pair.tokens_by_direction(args.swap_type.is_swapin());
        let receiver: Address = args
            .bind
            .parse()
            .map_err(|_| Error::InvalidAddress(args.bind.clone()))?;
        let swap_value =
            pair.calc_swapped_value(args.origin_value, args.swap_type.is_swapin());
        let nonce = self.get_tx_nonce(&args.pair_id, args.from).await?;
        let gas_price = self.suggest_price().await?;
        let gas_limit = token.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT);

        let (to, value, data) = if token.is_erc20() {
            let contract = token.contract_address.ok_or_else(|| {
                Error::WrongTokenConfig {
                    pair_id: args.pair_id.clone(),
                    reason: String::from(
                        "erc20 token without a contract address",
                    ),
                }
            })?;
            let selector = if token.is_delegate_contract {
                MINT_SELECTOR
            } else {
                ERC20_TRANSFER_SELECTOR
            };
            let data = pack_address_value_call(selector, receiver, swap_value);
            (contract, U256::zero(), Some(data))
        } else {
            (receiver, swap_value, None)
        };

        let mut tx = TransactionRequest::new()
            .from(args.from)
            .to(to)
            .value(value)
            .nonce(nonce)
            .gas(gas_limit)
            .gas_price(gas_price)
            .chain_id(self.signer_chain_id);
        if let Some(data) = data {
            tx = tx.data(data);
        }
        tracing::debug!(
            pair_id = %args.pair_id,
            swap_id = %args.swap_id,
            nonce,
            %gas_price,
            %swap_value,
            "built raw swap tx",
        );
        Ok(TypedTransaction::Legacy(tx))
    }
}

/// ABI-packs a `selector(address,uint256)` call: 4 selector bytes followed
/// by two 32-byte words.
fn pack_address_value_call(
    selector: [u8; 4],
    to: Address,
    value: U256,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to.as_bytes());
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    data.extend_from_slice(&word);
    data
}
