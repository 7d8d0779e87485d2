use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bridge_chain_traits::SwapType;
use parking_lot::RwLock;

use super::{
    swap_key, BlacklistStore, MatchTx, SwapNonceStore, SwapRecord,
    SwapResult, SwapResultStore, SwapScanStore, SwapStatus,
};

/// InMemoryStore keeps the swap state in process memory.
///
/// It implements the same traits as the sled backend and is what the
/// pipeline tests run against.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    swaps: Arc<RwLock<HashMap<String, SwapRecord>>>,
    results: Arc<RwLock<HashMap<String, SwapResult>>>,
    nonces: Arc<RwLock<HashMap<String, u64>>>,
    blacklist: Arc<RwLock<HashSet<String>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl SwapScanStore for InMemoryStore {
    fn register_swap(&self, swap: &SwapRecord) -> crate::Result<()> {
        let key =
            swap_key(swap.swap_type, &swap.pair_id, &swap.swap_id, &swap.bind);
        self.swaps.write().insert(key, swap.clone());
        Ok(())
    }

    fn get_swap(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
    ) -> crate::Result<Option<SwapRecord>> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        Ok(self.swaps.read().get(&key).cloned())
    }

    fn find_swaps_with_status(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        status: SwapStatus,
        septime: u64,
    ) -> crate::Result<Vec<SwapRecord>> {
        let pair_id = pair_id.to_lowercase();
        let found = self
            .swaps
            .read()
            .values()
            .filter(|s| {
                s.swap_type == swap_type
                    && s.pair_id.to_lowercase() == pair_id
                    && s.status == status
                    && s.timestamp >= septime
            })
            .cloned()
            .collect();
        Ok(found)
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
        let mut guard = self.swaps.write();
        let swap = guard
            .get_mut(&key)
            .ok_or(crate::Error::NotFound("swap record"))?;
        swap.status = status;
        swap.timestamp = super::now();
        Ok(())
    }
}

impl SwapResultStore for InMemoryStore {
    fn register_swap_result(&self, result: &SwapResult) -> crate::Result<()> {
        let key = swap_key(
            result.swap_type,
            &result.pair_id,
            &result.swap_id,
            &result.bind,
        );
        self.results.write().insert(key, result.clone());
        Ok(())
    }

    fn find_swap_result(
        &self,
        swap_type: SwapType,
        pair_id: &str,
        swap_id: &str,
        bind: &str,
    ) -> crate::Result<Option<SwapResult>> {
        let key = swap_key(swap_type, pair_id, swap_id, bind);
        Ok(self.results.read().get(&key).cloned())
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
        let mut guard = self.results.write();
        let result = guard
            .get_mut(&key)
            .ok_or(crate::Error::NotFound("swap result"))?;
        result.status = status;
        if !memo.is_empty() {
            result.memo = memo.to_string();
        }
        result.timestamp = super::now();
        Ok(())
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
        let mut guard = self.results.write();
        let result = guard
            .get_mut(&key)
            .ok_or(crate::Error::NotFound("swap result"))?;
        if !result.swap_tx.is_empty() {
            let old = std::mem::take(&mut result.swap_tx);
            result.old_swap_txs.push(old);
        }
        result.swap_tx = match_tx.swap_tx.clone();
        result.swap_value = match_tx.swap_value.clone();
        result.swap_nonce = match_tx.swap_nonce;
        result.status = SwapStatus::TxProcessed;
        result.timestamp = super::now();
        Ok(())
    }
}

impl SwapNonceStore for InMemoryStore {
    fn load_all_swap_nonces(
        &self,
    ) -> crate::Result<(HashMap<String, u64>, HashMap<String, u64>)> {
        let guard = self.nonces.read();
        let mut swapin = HashMap::new();
        let mut swapout = HashMap::new();
        for (key, nonce) in guard.iter() {
            if let Some(pair_id) = key.strip_prefix("swapin:") {
                swapin.insert(pair_id.to_string(), *nonce);
            } else if let Some(pair_id) = key.strip_prefix("swapout:") {
                swapout.insert(pair_id.to_string(), *nonce);
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
        let key = format!("{}:{}", swap_type, pair_id.to_lowercase());
        self.nonces.write().insert(key, nonce);
        Ok(())
    }
}

impl BlacklistStore for InMemoryStore {
    fn is_blacklisted(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<bool> {
        let key =
            format!("{}:{}", pair_id.to_lowercase(), address.to_lowercase());
        Ok(self.blacklist.read().contains(&key))
    }

    fn add_to_blacklist(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<()> {
        let key =
            format!("{}:{}", pair_id.to_lowercase(), address.to_lowercase());
        self.blacklist.write().insert(key);
        Ok(())
    }

    fn remove_from_blacklist(
        &self,
        address: &str,
        pair_id: &str,
    ) -> crate::Result<()> {
        let key =
            format!("{}:{}", pair_id.to_lowercase(), address.to_lowercase());
        self.blacklist.write().remove(&key);
        Ok(())
    }
}
