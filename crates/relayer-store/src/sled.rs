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

use std::collections::HashMap;
use std::path::Path;

use bridge_chain_traits::SwapType;

use super::{
    swap_key, BlacklistStore, MatchTx, SwapNonceStore, SwapRecord,
    SwapResult, SwapResultStore, SwapScanStore, SwapStatus,
};

const SWAPS_TREE: &str = "swaps";
const SWAP_RESULTS_TREE: &str = "swap_results";
const SWAP_NONCES_TREE: &str = "swap_nonces";
const BLACKLIST_TREE: &str = "blacklist";

/// SledStore stores the swap state in a [Sled](https://sled.rs)-based
/// database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Create a new SledStore.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .temporary(cfg!(test))
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// Creates a temporary SledStore.
    pub fn temporary() -> crate::Result<Self> {
        let dir = tempfile::tempdir()?;
        Self::open(dir.path())
    }

    /// Gets the total amount of data stored on disk
    pub fn get_data_stored_size(&self) -> u64 {
        self.db.size_on_disk().unwrap_or_default()
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        tree: &str,
        key: &str,
    ) -> crate::Result<Option<T>> {
        let tree = self.db.open_tree(tree)?;
        let val = tree.get(key.as_bytes())?;
        match val {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn insert_json<T: serde::Serialize>(
        &self,
        tree: &str,
        key: &str,
        value: &T,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(tree)?;
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }
}

impl SwapScanStore for SledStore {
    #[tracing::instrument(skip(self, swap), fields(swap_id = %swap.swap_id))]
    fn register_swap(&self, swap: &SwapRecord) -> crate::Result<()> {
        let key =
            swap_key(swap.swap_type, &swap.pair_id, &swap.swap_id, &swap.bind);
        self.insert_json(SWAPS_TREE, &key, swap)
    }

    fn get_swap(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
    ) -> crate::Result<Option<SwapRecord>> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        self.get_json(SWAPS_TREE, &key)
    }

    fn find_swaps_with_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        status: SwapStatus,
        septime: u64,
    ) -> crate::Result<Vec<SwapRecord>> {
        let tree = self.db.open_tree(SWAPS_TREE)?;
        let prefix = format!("{}:{}:", swap_type, pair_id.to_lowercase());
        let mut out = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            let swap: SwapRecord = serde_json::from_slice(&bytes)?;
            if swap.status == status && swap.timestamp >= septime {
                out.push(swap);
            }
        }
        Ok(out)
    }

    fn update_swap_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
        status: SwapStatus,
    ) -> crate::Result<()> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        let mut swap: SwapRecord = self
            .get_json(SWAPS_TREE, &key)?
            .ok_or(crate::Error::NotFound("swap record"))?;
        swap.status = status;
        swap.timestamp = super::now();
        self.insert_json(SWAPS_TREE, &key, &swap)
    }
}

impl SwapResultStore for SledStore {
    #[tracing::instrument(
        skip(self, result),
        fields(swap_id = %result.swap_id)
    )]
    fn register_swap_result(&self, result: &SwapResult) -> crate::Result<()> {
        let key = swap_key(
            result.swap_type,
            &result.pair_id,
            &result.swap_id,
            &result.bind,
        );
        self.insert_json(SWAP_RESULTS_TREE, &key, result)
    }

    fn find_swap_result(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
    ) -> crate::Result<Option<SwapResult>> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        self.get_json(SWAP_RESULTS_TREE, &key)
    }

    fn update_swap_result_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
        status: SwapStatus,
        memo: &str,
    ) -> crate::Result<()> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        let mut result: SwapResult = self
            .get_json(SWAP_RESULTS_TREE, &key)?
            .ok_or(crate::Error::NotFound("swap result"))?;
        result.status = status;
        if !memo.is_empty() {
            result.memo = memo.to_string();
        }
        result.timestamp = super::now();
        self.insert_json(SWAP_RESULTS_TREE, &key, &result)
    }

    fn update_swap_result_match(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
        match_tx: &MatchTx,
    ) -> crate::Result<()> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        let mut result: SwapResult = self
            .get_json(SWAP_RESULTS_TREE, &key)?
            .ok_or(crate::Error::NotFound("swap result"))?;
        if !result.swap_tx.is_empty() {
            result.old_swap_txs.push(result.swap_tx.clone());
        }
        result.swap_tx = match_tx.swap_tx.clone();
        result.swap_value = match_tx.swap_value.clone();
        result.swap_nonce = match_tx.swap_nonce;
        result.status = SwapStatus::TxProcessed;
        result.timestamp = super::now();
        // the whole record goes down in one insert, so `swap_tx` and
        // `status` can never be observed apart
        self.insert_json(SWAP_RESULTS_TREE, &key, &result)
    }
}

impl SwapNonceStore for SledStore {
    fn load_all_swap_nonces(
        &self,
    ) -> crate::Result<(HashMap<String, u64>, HashMap<String, u64>)> {
        let tree = self.db.open_tree(SWAP_NONCES_TREE)?;
        let mut swapin = HashMap::new();
        let mut swapout = HashMap::new();
        for entry in tree.iter() {
            let (key, bytes) = entry?;
            let key = String::from_utf8_lossy(&key).into_owned();
            let mut value = [0u8; 8];
            value.copy_from_slice(&bytes);
            let nonce = u64::from_le_bytes(value);
            if let Some(pair_id) = key.strip_prefix("swapin:") {
                swapin.insert(pair_id.to_string(), nonce);
            } else if let Some(pair_id) = key.strip_prefix("swapout:") {
                swapout.insert(pair_id.to_string(), nonce);
            }
        }
        Ok((swapin, swapout))
    }

    fn set_swap_nonce(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        nonce: u64,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(SWAP_NONCES_TREE)?;
        let key = format!("{}:{}", swap_type, pair_id.to_lowercase());
        tree.insert(key.as_bytes(), &nonce.to_le_bytes())?;
        Ok(())
    }
}

impl BlacklistStore for SledStore {
    fn is_blacklisted(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<bool> {
        let tree = self.db.open_tree(BLACKLIST_TREE)?;
        let key =
            format!("{}:{}", pair_id.to_lowercase(), address.to_lowercase());
        Ok(tree.contains_key(key.as_bytes())?)
    }

    fn add_to_blacklist(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(BLACKLIST_TREE)?;
        let key =
            format!("{}:{}", pair_id.to_lowercase(), address.to_lowercase());
        tree.insert(key.as_bytes(), &[])?;
        Ok(())
    }

    fn remove_from_blacklist(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree(BLACKLIST_TREE)?;
        let key =
            format!("{}:{}", pair_id.to_lowercase(), address.to_lowercase());
        tree.remove(key.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unswapped_result() -> SwapResult {
        SwapResult {
            pair_id: String::from("eth/btc"),
            swap_id: String::from("0xAAA"),
            swap_type: SwapType::Swapin,
            bind: String::from("0xB"),
            from: String::from("0xF"),
            value: String::from("1000000"),
            swap_tx: String::new(),
            swap_value: String::new(),
            swap_nonce: 0,
            swap_height: 0,
            old_swap_txs: Vec::new(),
            status: SwapStatus::MatchTxEmpty,
            memo: String::new(),
            timestamp: 0,
        }
    }

    #[test]
    fn match_update_is_atomic_over_tx_and_status() {
        let store = SledStore::temporary().unwrap();
        store.register_swap_result(&unswapped_result()).unwrap();

        let before = store
            .find_swap_result(SwapType::Swapin, "eth/btc", "0xaaa", "0xb")
            .unwrap()
            .unwrap();
        assert!(before.is_unswapped());

        let match_tx = MatchTx {
            swap_tx: String::from("0xdeadbeef"),
            swap_value: String::from("999000"),
            swap_type: SwapType::Swapin,
            swap_nonce: 7,
        };
        store
            .update_swap_result_match(
                SwapType::Swapin,
                "eth/btc",
                "0xaaa",
                "0xb",
                &match_tx,
            )
            .unwrap();

        let after = store
            .find_swap_result(SwapType::Swapin, "eth/btc", "0xAAA", "0xB")
            .unwrap()
            .unwrap();
        assert!(!after.is_unswapped());
        assert_eq!(after.swap_tx, "0xdeadbeef");
        assert_eq!(after.status, SwapStatus::TxProcessed);
        assert_eq!(after.swap_nonce, 7);
    }

    #[test]
    fn retried_match_keeps_the_old_tx_hash() {
        let store = SledStore::temporary().unwrap();
        store.register_swap_result(&unswapped_result()).unwrap();
        for (i, hash) in ["0x01", "0x02"].iter().enumerate() {
            let match_tx = MatchTx {
                swap_tx: hash.to_string(),
                swap_value: String::from("999000"),
                swap_type: SwapType::Swapin,
                swap_nonce: i as u64,
            };
            store
                .update_swap_result_match(
                    SwapType::Swapin,
                    "eth/btc",
                    "0xaaa",
                    "0xb",
                    &match_tx,
                )
                .unwrap();
        }
        let result = store
            .find_swap_result(SwapType::Swapin, "eth/btc", "0xaaa", "0xb")
            .unwrap()
            .unwrap();
        assert_eq!(result.swap_tx, "0x02");
        assert_eq!(result.old_swap_txs, vec![String::from("0x01")]);
    }

    #[test]
    fn nonces_round_trip_by_direction() {
        let store = SledStore::temporary().unwrap();
        store
            .set_swap_nonce(SwapType::Swapin, "eth/btc", 42)
            .unwrap();
        store
            .set_swap_nonce(SwapType::Swapout, "eth/btc", 7)
            .unwrap();
        let (swapin, swapout) = store.load_all_swap_nonces().unwrap();
        assert_eq!(swapin.get("eth/btc"), Some(&42));
        assert_eq!(swapout.get("eth/btc"), Some(&7));
    }

    #[test]
    fn blacklist_is_per_pair_and_case_insensitive() {
        let store = SledStore::temporary().unwrap();
        store.add_to_blacklist("0xBAD", "eth/btc").unwrap();
        assert!(store.is_blacklisted("0xbad", "eth/btc").unwrap());
        assert!(!store.is_blacklisted("0xbad", "eth/usdc").unwrap());
        store.remove_from_blacklist("0xbad", "eth/btc").unwrap();
        assert!(!store.is_blacklisted("0xBAD", "eth/btc").unwrap());
    }

    #[test]
    fn scan_filters_on_status_and_septime() {
        let store = SledStore::temporary().unwrap();
        let mut fresh = SwapRecord {
            pair_id: String::from("eth/btc"),
            swap_id: String::from("0x01"),
            swap_type: SwapType::Swapin,
            bind: String::from("0xB"),
            from: String::from("0xF"),
            status: SwapStatus::TxNotSwapped,
            timestamp: 1_000,
        };
        store.register_swap(&fresh).unwrap();
        fresh.swap_id = String::from("0x02");
        fresh.timestamp = 10;
        store.register_swap(&fresh).unwrap();
        fresh.swap_id = String::from("0x03");
        fresh.timestamp = 2_000;
        fresh.status = SwapStatus::TxProcessed;
        store.register_swap(&fresh).unwrap();

        let found = store
            .find_swaps_with_status(
                SwapType::Swapin,
                "eth/btc",
                SwapStatus::TxNotSwapped,
                500,
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].swap_id, "0x01");
    }
}
