//! Mocked JSON-RPC endpoints for tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{response::Json, routing::post, Router};
use bridge_relayer_types::rpc_url::RpcUrl;
use serde_json::Value;

fn random_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// What one mocked endpoint answers.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Answer every request with a JSON-RPC error object.
    Error,
    /// Answer every request with a `null` result.
    Null,
    /// Answer every request with the given result value.
    Result(Value),
    /// Answer per method; unknown methods get a JSON-RPC error.
    ByMethod(HashMap<String, Value>),
}

/// A handle on one spawned mock endpoint.
pub struct MockEndpoint {
    /// The URL the endpoint listens on.
    pub url: RpcUrl,
    calls: Arc<AtomicUsize>,
    server_thread: tokio::task::JoinHandle<()>,
}

impl MockEndpoint {
    /// How many requests this endpoint has served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.server_thread.abort();
    }
}

/// Spawns a mock JSON-RPC endpoint with the given behavior.
pub fn spawn(behavior: Behavior) -> MockEndpoint {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let port = random_free_port();
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let url = RpcUrl::from_str(&format!("http://{addr}/")).unwrap();
    let handle = tokio::spawn(async move {
        let app = Router::new().route(
            "/",
            post(move |Json(req): Json<Value>| {
                let behavior = behavior.clone();
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    let id = req.get("id").cloned().unwrap_or_default();
                    let method = req
                        .get("method")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let error = serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32000, "message": "boom"},
                    });
                    let body = match behavior {
                        Behavior::Error => error,
                        Behavior::Null => serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": Value::Null,
                        }),
                        Behavior::Result(v) => serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": v,
                        }),
                        Behavior::ByMethod(methods) => match methods.get(method)
                        {
                            Some(v) => serde_json::json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "result": v,
                            }),
                            None => error,
                        },
                    };
                    Json(body)
                }
            }),
        );
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    MockEndpoint {
        url,
        calls,
        server_thread: handle,
    }
}

/// Gives the spawned servers a moment to start listening.
pub async fn wait_for_startup() {
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}
