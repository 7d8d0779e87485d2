use std::collections::HashMap;
use std::sync::Arc;

use bridge_chain_traits::token::{TokenConfig, TokenPairConfig};
use bridge_chain_traits::{BuildTxArgs, ChainBridge, SwapType};
use bridge_evm_chain::EthBridge;
use bridge_relayer_config::{ChainConfig, GatewayConfig};
use bridge_rpc_dispatch::test_utils::{spawn, wait_for_startup, Behavior};
use ethers::types::{Address, NameOrAddress, U256, U64};

fn chain() -> ChainConfig {
    ChainConfig {
        block_chain: String::from("Ethereum"),
        net_id: String::from("custom"),
    }
}

fn by_method(pairs: &[(&str, serde_json::Value)]) -> Behavior {
    let mut map = HashMap::new();
    for (method, value) in pairs {
        map.insert(method.to_string(), value.clone());
    }
    Behavior::ByMethod(map)
}

fn token(decimals: u8, erc20: bool) -> TokenConfig {
    TokenConfig {
        name: String::from("Wrapped Coin"),
        symbol: String::from("WCOIN"),
        decimals,
        id: erc20.then(|| String::from("ERC20")),
        contract_address: erc20.then(|| Address::repeat_byte(0x11)),
        dts_address: Address::repeat_byte(0x22),
        dts_pubkey: String::from("04deadbeef"),
        deposit_address: Some(Address::repeat_byte(0x33)),
        is_delegate_contract: false,
        disable_swap: false,
        private_key: None,
        swap_fee_rate: 0.0,
        min_swap_fee: 0,
        max_swap_fee: 0,
        gas_limit: Some(120_000),
    }
}

fn pairs(erc20_dest: bool) -> Arc<HashMap<String, TokenPairConfig>> {
    let mut map = HashMap::new();
    map.insert(
        String::from("eth/btc"),
        TokenPairConfig {
            src_token: token(18, false),
            dest_token: token(18, erc20_dest),
        },
    );
    Arc::new(map)
}

fn args() -> BuildTxArgs {
    BuildTxArgs {
        identifier: String::from("bridgeworks"),
        pair_id: String::from("eth/btc"),
        swap_id: String::from("0xaaa"),
        swap_type: SwapType::Swapin,
        bind: format!("{:?}", Address::repeat_byte(0xbb)),
        from: Address::repeat_byte(0x22),
        origin_value: U256::from(1_000_000u64),
    }
}

const FIFTY_GWEI: u64 = 50_000_000_000;
const EIGHTY_GWEI: u64 = 80_000_000_000;

#[tokio::test]
async fn gas_price_is_the_max_over_both_endpoint_lists() {
    let primary = spawn(by_method(&[
        ("eth_chainId", serde_json::json!("0x1")),
        ("eth_blockNumber", serde_json::json!("0x64")),
        (
            "eth_gasPrice",
            serde_json::json!(format!("0x{FIFTY_GWEI:x}")),
        ),
    ]));
    let ext = spawn(by_method(&[(
        "eth_gasPrice",
        serde_json::json!(format!("0x{EIGHTY_GWEI:x}")),
    )]));
    wait_for_startup().await;
    let gateway = GatewayConfig {
        api_address: vec![primary.url.clone()],
        api_address_ext: vec![ext.url.clone()],
    };
    let bridge =
        EthBridge::connect(false, chain(), gateway, pairs(true), None)
            .await
            .unwrap();
    let price = bridge.suggest_price().await.unwrap();
    assert_eq!(price, U256::from(EIGHTY_GWEI));
}

#[tokio::test]
async fn gas_price_falls_back_to_the_answering_list() {
    let primary = spawn(by_method(&[
        ("eth_chainId", serde_json::json!("0x1")),
        ("eth_blockNumber", serde_json::json!("0x64")),
        (
            "eth_gasPrice",
            serde_json::json!(format!("0x{FIFTY_GWEI:x}")),
        ),
    ]));
    let dead_ext = spawn(Behavior::Error);
    wait_for_startup().await;
    let gateway = GatewayConfig {
        api_address: vec![primary.url.clone()],
        api_address_ext: vec![dead_ext.url.clone()],
    };
    let bridge =
        EthBridge::connect(false, chain(), gateway, pairs(true), None)
            .await
            .unwrap();
    let price = bridge.suggest_price().await.unwrap();
    assert_eq!(price, U256::from(FIFTY_GWEI));
}

#[tokio::test]
async fn built_erc20_tx_carries_nonce_payload_and_price() {
    let primary = spawn(by_method(&[
        ("eth_chainId", serde_json::json!("0x1")),
        ("eth_blockNumber", serde_json::json!("0x64")),
        ("eth_getTransactionCount", serde_json::json!("0x2")),
        (
            "eth_gasPrice",
            serde_json::json!(format!("0x{FIFTY_GWEI:x}")),
        ),
    ]));
    wait_for_startup().await;
    let gateway = GatewayConfig {
        api_address: vec![primary.url.clone()],
        api_address_ext: Vec::new(),
    };
    let bridge =
        EthBridge::connect(false, chain(), gateway, pairs(true), None)
            .await
            .unwrap();
    // the locally tracked counter is ahead of the chain's pool nonce
    bridge
        .nonce_setter()
        .expect("evm bridges track nonces")
        .set_nonce("eth/btc", 5);

    let tx = bridge.build_raw_transaction(&args()).await.unwrap();
    assert_eq!(tx.nonce(), Some(&U256::from(5u64)));
    assert_eq!(tx.gas_price(), Some(U256::from(FIFTY_GWEI)));
    assert_eq!(tx.gas(), Some(&U256::from(120_000u64)));
    assert_eq!(tx.chain_id(), Some(U64::from(1u64)));
    assert_eq!(
        tx.to(),
        Some(&NameOrAddress::Address(Address::repeat_byte(0x11)))
    );
    assert_eq!(tx.value(), Some(&U256::zero()));
    let data = tx.data().expect("erc20 swaps carry calldata");
    // transfer(bind, swap_value)
    assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
    assert_eq!(&data[16..36], Address::repeat_byte(0xbb).as_bytes());
    assert_eq!(
        U256::from_big_endian(&data[36..]),
        U256::from(1_000_000u64)
    );
}

#[tokio::test]
async fn built_native_tx_moves_the_swap_value_directly() {
    let primary = spawn(by_method(&[
        ("eth_chainId", serde_json::json!("0x1")),
        ("eth_blockNumber", serde_json::json!("0x64")),
        ("eth_getTransactionCount", serde_json::json!("0x7")),
        (
            "eth_gasPrice",
            serde_json::json!(format!("0x{FIFTY_GWEI:x}")),
        ),
    ]));
    wait_for_startup().await;
    let gateway = GatewayConfig {
        api_address: vec![primary.url.clone()],
        api_address_ext: Vec::new(),
    };
    let bridge =
        EthBridge::connect(false, chain(), gateway, pairs(false), None)
            .await
            .unwrap();

    let tx = bridge.build_raw_transaction(&args()).await.unwrap();
    // no local counter yet, so the pool nonce wins
    assert_eq!(tx.nonce(), Some(&U256::from(7u64)));
    assert_eq!(
        tx.to(),
        Some(&NameOrAddress::Address(Address::repeat_byte(0xbb)))
    );
    assert_eq!(tx.value(), Some(&U256::from(1_000_000u64)));
    assert!(tx.data().is_none());
}
