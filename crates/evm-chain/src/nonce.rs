use std::collections::HashMap;

use bridge_chain_traits::NonceSetter;
use ethers::types::Address;
use parking_lot::Mutex;

use crate::EthBridge;

/// In-memory per-pair outbound nonce counters.
///
/// The counters only ever move forward; a swap that failed to broadcast
/// leaves its reserved nonce as a gap rather than risking a replay.
#[derive(Debug, Default)]
pub struct NonceTracker {
    nonces: Mutex<HashMap<String, u64>>,
}

impl NonceSetter for NonceTracker {
    fn init_nonces(&self, nonces: HashMap<String, u64>) {
        let mut guard = self.nonces.lock();
        for (pair_id, nonce) in nonces {
            let entry = guard.entry(pair_id.to_lowercase()).or_insert(nonce);
            if *entry < nonce {
                *entry = nonce;
            }
        }
    }

    fn get_nonce(&self, pair_id: &str) -> u64 {
        self.nonces
            .lock()
            .get(&pair_id.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    fn set_nonce(&self, pair_id: &str, nonce: u64) {
        let mut guard = self.nonces.lock();
        let entry = guard.entry(pair_id.to_lowercase()).or_insert(nonce);
        if *entry < nonce {
            *entry = nonce;
        }
    }
}

impl EthBridge {
    /// Reserve the nonce for the next outbound transaction of a pair:
    /// the greater of our local counter and the chain's pending pool
    /// nonce for the sender account.
    pub(crate) async fn get_tx_nonce(
        &self,
        pair_id: &str,
        from: Address,
    ) -> bridge_relayer_utils::Result<u64> {
        let pool_nonce = self.pool_nonce(from, "pending").await?;
        let local_nonce = self.nonces.get_nonce(pair_id);
        Ok(pool_nonce.max(local_nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_never_move_backwards() {
        let tracker = NonceTracker::default();
        tracker.set_nonce("eth/btc", 5);
        tracker.set_nonce("eth/btc", 3);
        assert_eq!(tracker.get_nonce("eth/btc"), 5);
        tracker.set_nonce("eth/btc", 6);
        assert_eq!(tracker.get_nonce("eth/btc"), 6);
    }

    #[test]
    fn init_seeds_and_keeps_the_maximum() {
        let tracker = NonceTracker::default();
        tracker.set_nonce("eth/btc", 9);
        let mut seed = HashMap::new();
        seed.insert(String::from("eth/btc"), 4);
        seed.insert(String::from("eth/usdc"), 2);
        tracker.init_nonces(seed);
        assert_eq!(tracker.get_nonce("eth/btc"), 9);
        assert_eq!(tracker.get_nonce("eth/usdc"), 2);
    }

    #[test]
    fn pair_ids_are_case_insensitive() {
        let tracker = NonceTracker::default();
        tracker.set_nonce("ETH/BTC", 7);
        assert_eq!(tracker.get_nonce("eth/btc"), 7);
    }
}
