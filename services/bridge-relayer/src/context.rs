use bridge_relayer_config::BridgeRelayerConfig;
use bridge_relayer_store::SledStore;
use tokio::sync::broadcast;

/// BridgeContext contains the relayer's configuration, its store handle
/// and the shutdown signal.
#[derive(Clone)]
pub struct BridgeContext {
    config: BridgeRelayerConfig,
    store: SledStore,
    /// Broadcasts a shutdown signal to all running tasks.
    ///
    /// Every long-running task subscribes a receiver; when a graceful
    /// shutdown is initiated a `()` is sent and each task reaches a safe
    /// terminal state on its own.
    notify_shutdown: broadcast::Sender<()>,
}

impl BridgeContext {
    /// Creates a new BridgeContext.
    pub fn new(config: BridgeRelayerConfig, store: SledStore) -> Self {
        let (notify_shutdown, _) = broadcast::channel(2);
        Self {
            config,
            store,
            notify_shutdown,
        }
    }

    /// The relayer configuration.
    pub fn config(&self) -> &BridgeRelayerConfig {
        &self.config
    }

    /// The persistent store.
    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// The shutdown broadcast handle, for tasks that need to subscribe.
    pub fn notify_shutdown(&self) -> &broadcast::Sender<()> {
        &self.notify_shutdown
    }

    /// Sends a shutdown signal to all subscribed tasks.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }
}
