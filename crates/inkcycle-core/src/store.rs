//! Process-wide configuration store.
//!
//! `ConfigStore` holds the in-memory `Config` (the source of truth) and
//! persists it atomically on request. Reads hand out clones so no lock is
//! held across rendering or device I/O.

use crate::config::{Config, PluginInfo};
use crate::error::{InkError, Result};
use crate::orchestrator::RefreshRecord;
use crate::paths;
use crate::playlist::Playlist;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<Config>,
    // Serializes disk writes so a later snapshot never loses to an earlier one.
    persist_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(config),
            persist_lock: Mutex::new(()),
        }
    }

    /// Load `<root>/.inkcycle/device.yaml`.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_path(paths::config_path(root))
    }

    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = Config::load_from(&path)?;
        Ok(Self::new(path, config))
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Config> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        f(&self.read_guard())
    }

    /// Mutate the in-memory config. Call [`persist`](Self::persist) to
    /// make the change durable.
    pub fn update<R>(&self, f: impl FnOnce(&mut Config) -> R) -> R {
        f(&mut self.write_guard())
    }

    pub fn snapshot(&self) -> Config {
        self.read(Config::clone)
    }

    // ---------------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------------

    pub fn get_playlist(&self, name: &str) -> Result<Playlist> {
        self.read(|c| c.playlist_config.get_playlist(name).cloned())
    }

    pub fn list_playlists(&self) -> Vec<Playlist> {
        self.read(|c| c.playlist_config.playlists.clone())
    }

    pub fn get_plugin_registry_entry(&self, plugin_id: &str) -> Result<PluginInfo> {
        self.read(|c| c.plugin(plugin_id).cloned())
            .ok_or_else(|| InkError::PluginNotFound(plugin_id.to_string()))
    }

    pub fn get_refresh_record(&self) -> Option<RefreshRecord> {
        self.read(|c| c.refresh_info.clone())
    }

    pub fn set_refresh_record(&self, record: RefreshRecord) {
        self.update(|c| c.refresh_info = Some(record));
    }

    /// Opaque plugin data lookup; `default` when the key is absent.
    pub fn get_plugin_data(
        &self,
        plugin_id: &str,
        key: &str,
        default: serde_json::Value,
    ) -> serde_json::Value {
        self.read(|c| {
            c.plugin_data
                .get(plugin_id)
                .and_then(|data| data.get(key))
                .cloned()
        })
        .unwrap_or(default)
    }

    pub fn set_plugin_data(&self, plugin_id: &str, key: &str, value: serde_json::Value) {
        self.update(|c| {
            c.plugin_data
                .entry(plugin_id.to_string())
                .or_default()
                .insert(key.to_string(), value);
        });
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    /// Atomically replace the on-disk config with the in-memory one.
    ///
    /// On failure the previous file is left untouched and the in-memory
    /// state stays authoritative.
    pub fn persist(&self) -> Result<()> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let data = self
            .read(serde_yaml::to_string)
            .map_err(|e| InkError::ConfigPersist(e.to_string()))?;
        crate::io::atomic_write(&self.path, data.as_bytes())
            .map_err(|e| InkError::ConfigPersist(format!("{}: {e}", self.path.display())))
    }
}
