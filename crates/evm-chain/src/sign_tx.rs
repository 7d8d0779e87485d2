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

use bridge_chain_traits::{BuildTxArgs, SignedTx};
use bridge_relayer_utils::{Error, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Signature, H256, U256};
use ethers::utils::keccak256;

use crate::EthBridge;

impl EthBridge {
    /// Sign with the token's locally held key.
    pub(crate) fn sign_tx_locally(
        &self,
        tx: &TypedTransaction,
        pair_id: &str,
    ) -> Result<SignedTx> {
        let token = self
            .token_config_or_err(pair_id)?;
        let key = token.private_key.ok_or(Error::MissingPrivateKey)?;
        let wallet = LocalWallet::from_bytes(key.as_bytes())?
            .with_chain_id(self.signer_chain_id);
        let signature = wallet.sign_transaction_sync(tx)?;
        Ok(signed_from(tx, &signature))
    }

    /// Sign through the DTS cluster: submit the tx sighash with the swap
    /// args as the audit context, then splice the returned `(r, s, v)`
    /// into the transaction.
    pub(crate) async fn dts_sign_tx(
        &self,
        tx: &TypedTransaction,
        args: &BuildTxArgs,
    ) -> Result<SignedTx> {
        let dts = self.dts().ok_or(Error::DtsDisabled)?;
        let token = self.token_config_or_err(&args.pair_id)?;
        let sighash = tx.sighash();
        let outcome = dts
            .do_sign_one(
                &token.dts_pubkey,
                format!("{sighash:?}"),
                args.msg_context(),
            )
            .await?;
        let rsv = outcome.rsvs.first().ok_or_else(|| {
            Error::InvalidSignature(String::from("empty rsv list"))
        })?;
        let signature = signature_from_rsv(rsv, self.signer_chain_id)?;
        let signer = signature.recover(sighash)?;
        if signer != token.dts_address {
            return Err(Error::InvalidSignature(format!(
                "recovered signer {signer:?} is not the dts address {:?}",
                token.dts_address
            )));
        }
        tracing::info!(
            key_id = %outcome.key_id,
            swap_id = %args.swap_id,
            "dts sign tx success",
        );
        Ok(signed_from(tx, &signature))
    }

    fn token_config_or_err(
        &self,
        pair_id: &str,
    ) -> Result<bridge_chain_traits::token::TokenConfig> {
        use bridge_chain_traits::ChainBridge;
        self.token_config(pair_id)
            .ok_or_else(|| Error::TokenPairNotFound(pair_id.to_string()))
    }
}

fn signed_from(tx: &TypedTransaction, signature: &Signature) -> SignedTx {
    let raw = tx.rlp_signed(signature);
    let tx_hash = H256::from(keccak256(&raw));
    SignedTx { raw, tx_hash }
}

/// Splits a 65-byte `r||s||v` hex string into a signature, lifting the
/// recovery byte to its EIP-155 form for the given chain.
fn signature_from_rsv(rsv: &str, chain_id: u64) -> Result<Signature> {
    let bytes = hex::decode(rsv.trim_start_matches("0x"))?;
    if bytes.len() != 65 {
        return Err(Error::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }
    let r = U256::from_big_endian(&bytes[..32]);
    let s = U256::from_big_endian(&bytes[32..64]);
    let v = u64::from(bytes[64]) + chain_id * 2 + 35;
    Ok(Signature { r, s, v })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsv_round_trips_through_recovery() {
        let wallet = LocalWallet::from_bytes(&[0x17u8; 32]).unwrap();
        let digest = H256::from(keccak256(b"swap payload"));
        let plain = wallet.sign_hash(digest).unwrap();
        // the cluster hands back the raw recovery id as the last byte
        let mut rsv = [0u8; 65];
        plain.r.to_big_endian(&mut rsv[..32]);
        plain.s.to_big_endian(&mut rsv[32..64]);
        rsv[64] = (plain.v - 27) as u8;

        let chain_id = 5u64;
        let signature =
            signature_from_rsv(&hex::encode(rsv), chain_id).unwrap();
        assert_eq!(signature.v, (plain.v - 27) + chain_id * 2 + 35);
        assert_eq!(signature.recover(digest).unwrap(), wallet.address());
    }

    #[test]
    fn short_rsv_is_rejected() {
        let err = signature_from_rsv("0xabcd", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
    }
}
