use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_chain_traits::token::{TokenConfig, TokenPairConfig};
use bridge_chain_traits::{
    BuildTxArgs, ChainBridge, NonceSetter, SignedTx, SwapType,
};
use bridge_relayer_store::{
    BlacklistStore, InMemoryStore, SwapRecord, SwapResult, SwapResultStore,
    SwapScanStore, SwapStatus,
};
use bridge_relayer_store::SwapNonceStore;
use bridge_relayer_utils::{Error, Result};
use bridge_swap_relay::{SwapDispatcher, SwapExecutor};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use parking_lot::Mutex;

const PAIR_ID: &str = "eth/btc";
const SWAP_ID: &str = "0xaaa";
const BIND: &str = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0";

fn dts_address() -> Address {
    Address::repeat_byte(0x22)
}

fn token() -> TokenConfig {
    TokenConfig {
        name: String::from("Wrapped Coin"),
        symbol: String::from("WCOIN"),
        decimals: 18,
        id: None,
        contract_address: None,
        dts_address: dts_address(),
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

fn pairs() -> Arc<HashMap<String, TokenPairConfig>> {
    let mut map = HashMap::new();
    map.insert(
        PAIR_ID.to_string(),
        TokenPairConfig {
            src_token: token(),
            dest_token: token(),
        },
    );
    Arc::new(map)
}

#[derive(Default)]
struct TestNonceTracker {
    nonces: Mutex<HashMap<String, u64>>,
}

impl NonceSetter for TestNonceTracker {
    fn init_nonces(&self, nonces: HashMap<String, u64>) {
        self.nonces.lock().extend(nonces);
    }

    fn get_nonce(&self, pair_id: &str) -> u64 {
        self.nonces.lock().get(pair_id).copied().unwrap_or(0)
    }

    fn set_nonce(&self, pair_id: &str, nonce: u64) {
        let mut guard = self.nonces.lock();
        let entry = guard.entry(pair_id.to_string()).or_insert(nonce);
        if *entry < nonce {
            *entry = nonce;
        }
    }
}

/// A scripted bridge that records what the executor asks of it.
struct MockBridge {
    is_src: bool,
    pairs: Arc<HashMap<String, TokenPairConfig>>,
    store: Arc<InMemoryStore>,
    pool_nonce: AtomicU64,
    nonces: TestNonceTracker,
    fail_broadcast: AtomicBool,
    sign_calls: Mutex<Vec<String>>,
    broadcast_calls: Mutex<Vec<String>>,
    persisted_before_broadcast: AtomicBool,
}

impl MockBridge {
    fn new(store: Arc<InMemoryStore>, pool_nonce: u64) -> Arc<Self> {
        Arc::new(Self {
            is_src: false,
            pairs: pairs(),
            store,
            pool_nonce: AtomicU64::new(pool_nonce),
            nonces: TestNonceTracker::default(),
            fail_broadcast: AtomicBool::new(false),
            sign_calls: Mutex::new(Vec::new()),
            broadcast_calls: Mutex::new(Vec::new()),
            persisted_before_broadcast: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl ChainBridge for MockBridge {
    fn is_src(&self) -> bool {
        self.is_src
    }

    fn token_config(&self, pair_id: &str) -> Option<TokenConfig> {
        let pair = self.pairs.get(pair_id)?;
        if self.is_src {
            Some(pair.src_token.clone())
        } else {
            Some(pair.dest_token.clone())
        }
    }

    fn nonce_setter(&self) -> Option<&dyn NonceSetter> {
        Some(&self.nonces)
    }

    async fn get_latest_block_number(&self) -> Result<u64> {
        Ok(100)
    }

    async fn get_pool_nonce(&self, _address: Address) -> Result<u64> {
        Ok(self.pool_nonce.load(Ordering::SeqCst))
    }

    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<TypedTransaction> {
        let nonce = self
            .pool_nonce
            .load(Ordering::SeqCst)
            .max(self.nonces.get_nonce(&args.pair_id));
        let receiver: Address = args
            .bind
            .parse()
            .map_err(|_| Error::InvalidAddress(args.bind.clone()))?;
        let tx = TransactionRequest::new()
            .from(args.from)
            .to(receiver)
            .value(args.origin_value)
            .nonce(nonce)
            .gas(90_000u64)
            .gas_price(1_000_000_000u64)
            .chain_id(1u64);
        Ok(TypedTransaction::Legacy(tx))
    }

    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        _pair_id: &str,
    ) -> Result<SignedTx> {
        self.sign_calls.lock().push(String::from("local"));
        Ok(SignedTx {
            raw: tx.rlp(),
            tx_hash: tx.sighash(),
        })
    }

    async fn dts_sign_transaction(
        &self,
        tx: &TypedTransaction,
        args: &BuildTxArgs,
    ) -> Result<SignedTx> {
        self.sign_calls.lock().push(args.swap_id.clone());
        Ok(SignedTx {
            raw: tx.rlp(),
            tx_hash: tx.sighash(),
        })
    }

    async fn send_signed_transaction(&self, tx: &SignedTx) -> Result<()> {
        // the match record must already be down before anything reaches
        // the wire
        let persisted = self
            .store
            .find_swap_result(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
            .ok()
            .flatten()
            .map(|res| {
                res.status == SwapStatus::TxProcessed
                    && res.swap_tx == format!("{:?}", tx.tx_hash)
            })
            .unwrap_or(false);
        if !persisted {
            self.persisted_before_broadcast.store(false, Ordering::SeqCst);
        }
        self.broadcast_calls
            .lock()
            .push(format!("{:?}", tx.tx_hash));
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(Error::Generic("broadcast refused"));
        }
        Ok(())
    }
}

fn record() -> SwapRecord {
    SwapRecord {
        pair_id: PAIR_ID.to_string(),
        swap_id: SWAP_ID.to_string(),
        swap_type: SwapType::Swapin,
        bind: BIND.to_string(),
        from: String::from("0xf0f0"),
        status: SwapStatus::TxNotSwapped,
        timestamp: unix_now(),
    }
}

fn unswapped_result() -> SwapResult {
    SwapResult {
        pair_id: PAIR_ID.to_string(),
        swap_id: SWAP_ID.to_string(),
        swap_type: SwapType::Swapin,
        bind: BIND.to_string(),
        from: String::from("0xf0f0"),
        value: String::from("1000000"),
        swap_tx: String::new(),
        swap_value: String::new(),
        swap_nonce: 0,
        swap_height: 0,
        old_swap_txs: Vec::new(),
        status: SwapStatus::MatchTxEmpty,
        memo: String::new(),
        timestamp: unix_now(),
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn executor(
    bridge: Arc<MockBridge>,
    store: Arc<InMemoryStore>,
) -> Arc<SwapExecutor<MockBridge, InMemoryStore>> {
    Arc::new(
        SwapExecutor::builder()
            .src_bridge(bridge.clone())
            .dst_bridge(bridge)
            .store(store)
            .pairs(pairs())
            .identifier("bridgeworks-test")
            .build(),
    )
}

#[tokio::test]
async fn happy_path_swapin_signs_persists_broadcasts_and_advances() {
    let store = Arc::new(InMemoryStore::default());
    store.register_swap(&record()).unwrap();
    store.register_swap_result(&unswapped_result()).unwrap();
    let bridge = MockBridge::new(store.clone(), 4);
    let executor = executor(bridge.clone(), store.clone());

    let args = executor
        .process_swap(&record())
        .await
        .unwrap()
        .expect("swap is dispatchable");
    assert_eq!(args.from, dts_address());
    assert_eq!(args.origin_value, U256::from(1_000_000u64));
    executor.do_swap(&args).await.unwrap();

    // signed exactly once, through the cluster
    assert_eq!(bridge.sign_calls.lock().as_slice(), [SWAP_ID]);
    assert_eq!(bridge.broadcast_calls.lock().len(), 1);
    assert!(bridge.persisted_before_broadcast.load(Ordering::SeqCst));

    let result = store
        .find_swap_result(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
        .unwrap()
        .unwrap();
    assert_eq!(result.status, SwapStatus::TxProcessed);
    assert!(!result.swap_tx.is_empty());
    assert_eq!(result.swap_nonce, 4);

    let swap = store
        .get_swap(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
        .unwrap()
        .unwrap();
    assert_eq!(swap.status, SwapStatus::TxProcessed);

    // the local counter and the persisted counter both moved to nonce+1
    assert_eq!(bridge.nonces.get_nonce(PAIR_ID), 5);
    let (swapin_nonces, _) = store.load_all_swap_nonces().unwrap();
    assert_eq!(swapin_nonces.get(PAIR_ID), Some(&5));
}

#[tokio::test]
async fn a_swap_with_a_prior_tx_is_never_signed_again() {
    let store = Arc::new(InMemoryStore::default());
    store.register_swap(&record()).unwrap();
    let mut result = unswapped_result();
    result.swap_tx = String::from("0xprev");
    store.register_swap_result(&result).unwrap();
    let bridge = MockBridge::new(store.clone(), 4);
    let executor = executor(bridge.clone(), store.clone());

    let err = executor.do_swap(&dispatch_args()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadySwapped));
    assert!(bridge.sign_calls.lock().is_empty());
    assert!(bridge.broadcast_calls.lock().is_empty());
    let swap = store
        .get_swap(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
        .unwrap()
        .unwrap();
    assert_eq!(swap.status, SwapStatus::TxProcessed);
}

#[tokio::test]
async fn blacklisted_sender_terminates_the_swap_without_signing() {
    let store = Arc::new(InMemoryStore::default());
    store.register_swap(&record()).unwrap();
    store.register_swap_result(&unswapped_result()).unwrap();
    store.add_to_blacklist("0xf0f0", PAIR_ID).unwrap();
    let bridge = MockBridge::new(store.clone(), 4);
    let executor = executor(bridge.clone(), store.clone());

    let dispatched = executor.process_swap(&record()).await.unwrap();
    assert!(dispatched.is_none());
    assert!(bridge.sign_calls.lock().is_empty());
    let swap = store
        .get_swap(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
        .unwrap()
        .unwrap();
    assert_eq!(swap.status, SwapStatus::SwapInBlacklist);
}

#[tokio::test]
async fn blacklisted_bind_address_counts_too() {
    let store = Arc::new(InMemoryStore::default());
    store.register_swap(&record()).unwrap();
    store.register_swap_result(&unswapped_result()).unwrap();
    store.add_to_blacklist(BIND, PAIR_ID).unwrap();
    let bridge = MockBridge::new(store.clone(), 4);
    let executor = executor(bridge.clone(), store.clone());

    let dispatched = executor.process_swap(&record()).await.unwrap();
    assert!(dispatched.is_none());
    assert!(bridge.sign_calls.lock().is_empty());
}

#[tokio::test]
async fn broadcast_failure_leaves_the_nonce_unadvanced() {
    let store = Arc::new(InMemoryStore::default());
    store.register_swap(&record()).unwrap();
    store.register_swap_result(&unswapped_result()).unwrap();
    let bridge = MockBridge::new(store.clone(), 4);
    bridge.fail_broadcast.store(true, Ordering::SeqCst);
    let executor = executor(bridge.clone(), store.clone());

    let err = executor.do_swap(&dispatch_args()).await.unwrap_err();
    assert!(matches!(err, Error::Generic(_)));
    // persisted before the broadcast was attempted
    let result = store
        .find_swap_result(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
        .unwrap()
        .unwrap();
    assert_eq!(result.status, SwapStatus::TxProcessed);
    // but the counters did not move: the gap is deliberate
    assert_eq!(bridge.nonces.get_nonce(PAIR_ID), 0);
    let (swapin_nonces, _) = store.load_all_swap_nonces().unwrap();
    assert!(swapin_nonces.get(PAIR_ID).is_none());
}

#[tokio::test]
async fn sequential_swaps_reserve_contiguous_nonces() {
    let store = Arc::new(InMemoryStore::default());
    let bridge = MockBridge::new(store.clone(), 4);
    let executor = executor(bridge.clone(), store.clone());

    for (i, swap_id) in ["0x01", "0x02", "0x03"].iter().enumerate() {
        let mut swap = record();
        swap.swap_id = swap_id.to_string();
        let mut result = unswapped_result();
        result.swap_id = swap_id.to_string();
        store.register_swap(&swap).unwrap();
        store.register_swap_result(&result).unwrap();

        let args = executor.process_swap(&swap).await.unwrap().unwrap();
        executor.do_swap(&args).await.unwrap();

        let result = store
            .find_swap_result(SwapType::Swapin, PAIR_ID, swap_id, BIND)
            .unwrap()
            .unwrap();
        assert_eq!(result.swap_nonce, 4 + i as u64);
    }
    assert_eq!(bridge.nonces.get_nonce(PAIR_ID), 7);
}

#[tokio::test]
async fn dispatch_rejects_unknown_destination_addresses() {
    let store = Arc::new(InMemoryStore::default());
    let bridge = MockBridge::new(store.clone(), 0);
    let executor = executor(bridge, store);
    let dispatcher = SwapDispatcher::start(executor, &pairs());

    let mut args = dispatch_args();
    args.from = Address::repeat_byte(0x99);
    let err = dispatcher.dispatch(args).await.unwrap_err();
    assert!(matches!(err, Error::NoSwapChannel { .. }));
}

#[tokio::test]
async fn dispatched_swaps_are_consumed_from_the_queue() {
    let store = Arc::new(InMemoryStore::default());
    store.register_swap(&record()).unwrap();
    store.register_swap_result(&unswapped_result()).unwrap();
    let bridge = MockBridge::new(store.clone(), 4);
    let executor = executor(bridge.clone(), store.clone());
    let dispatcher = SwapDispatcher::start(executor.clone(), &pairs());

    let args = executor
        .process_swap(&record())
        .await
        .unwrap()
        .expect("swap is dispatchable");
    dispatcher.dispatch(args).await.unwrap();

    // give the consumer task a moment to drain the queue
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(bridge.broadcast_calls.lock().len(), 1);
    let result = store
        .find_swap_result(SwapType::Swapin, PAIR_ID, SWAP_ID, BIND)
        .unwrap()
        .unwrap();
    assert_eq!(result.status, SwapStatus::TxProcessed);
}

fn dispatch_args() -> BuildTxArgs {
    BuildTxArgs {
        identifier: String::from("bridgeworks-test"),
        pair_id: PAIR_ID.to_string(),
        swap_id: SWAP_ID.to_string(),
        swap_type: SwapType::Swapin,
        bind: BIND.to_string(),
        from: dts_address(),
        origin_value: U256::from(1_000_000u64),
    }
}
