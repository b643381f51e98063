use inkcycle_core::config::Config;
use inkcycle_core::display::{DisplayDevice, DisplayManager, DisplayProfile};
use inkcycle_core::orchestrator::{
    OrchestratorHandle, RefreshOrchestrator, Scheduler, SystemClock,
};
use inkcycle_core::provider::ProviderRegistry;
use inkcycle_core::store::ConfigStore;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub orchestrator: OrchestratorHandle,
}

impl AppState {
    pub fn new(store: Arc<ConfigStore>, orchestrator: OrchestratorHandle) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Load the config under `root`, wire the display manager (seeded with
    /// the last applied hash) and the built-in providers, and start the
    /// scheduling worker. Must be called inside a tokio runtime.
    pub fn boot(
        root: &Path,
        device: Box<dyn DisplayDevice>,
    ) -> inkcycle_core::Result<(Self, JoinHandle<()>)> {
        let store = Arc::new(ConfigStore::open(root)?);
        Ok(Self::start(store, device, ProviderRegistry::with_builtins(root)))
    }

    /// Start a worker over an already opened store.
    pub fn start(
        store: Arc<ConfigStore>,
        device: Box<dyn DisplayDevice>,
        providers: ProviderRegistry,
    ) -> (Self, JoinHandle<()>) {
        let profile = store.read(DisplayProfile::from_config);
        let last_hash = store.get_refresh_record().map(|r| r.image_hash);
        let display = DisplayManager::new(device, profile).with_last_hash(last_hash);
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            display,
            providers,
            Arc::new(SystemClock),
        );
        let (handle, task) = RefreshOrchestrator::spawn(scheduler);
        (Self::new(store, handle), task)
    }

    pub fn config(&self) -> Config {
        self.store.snapshot()
    }
}
