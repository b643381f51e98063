use crate::error::{InkError, Result};
use crate::orchestrator::RefreshRecord;
use crate::paths;
use crate::playlist::{PlaylistManager, PluginInstance};
use crate::types::{Orientation, Settings, TimeOfDay};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
        }
    }
}

// ---------------------------------------------------------------------------
// ImageEnhancement
// ---------------------------------------------------------------------------

/// Device-wide enhancement factors. 1.0 leaves the image unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageEnhancement {
    #[serde(default = "default_factor")]
    pub brightness: f32,
    #[serde(default = "default_factor")]
    pub contrast: f32,
    #[serde(default = "default_factor")]
    pub saturation: f32,
    #[serde(default = "default_factor")]
    pub sharpness: f32,
}

fn default_factor() -> f32 {
    1.0
}

impl Default for ImageEnhancement {
    fn default() -> Self {
        Self {
            brightness: default_factor(),
            contrast: default_factor(),
            saturation: default_factor(),
            sharpness: default_factor(),
        }
    }
}

impl ImageEnhancement {
    fn factors(&self) -> [(&'static str, f32); 4] {
        [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("sharpness", self.sharpness),
        ]
    }
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum dwell between two autonomous rotations.
    #[serde(default = "default_cycle_interval")]
    pub plugin_cycle_interval_seconds: u64,
    /// How often an idle scheduler re-checks the playlist windows.
    #[serde(default = "default_idle_recheck")]
    pub idle_recheck_seconds: u64,
    /// Upper bound on any single scheduler sleep.
    #[serde(default = "default_max_sleep")]
    pub max_sleep_seconds: u64,
}

fn default_cycle_interval() -> u64 {
    3600
}

fn default_idle_recheck() -> u64 {
    60
}

fn default_max_sleep() -> u64 {
    900
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            plugin_cycle_interval_seconds: default_cycle_interval(),
            idle_recheck_seconds: default_idle_recheck(),
            max_sleep_seconds: default_max_sleep(),
        }
    }
}

impl SchedulerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.plugin_cycle_interval_seconds)
    }

    pub fn idle_recheck(&self) -> Duration {
        Duration::from_secs(self.idle_recheck_seconds.max(1))
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_secs(self.max_sleep_seconds.max(1))
    }
}

// ---------------------------------------------------------------------------
// PluginInfo
// ---------------------------------------------------------------------------

/// Plugin registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Per-plugin image flags applied by the display pipeline (e.g. `keep-width`).
    #[serde(default)]
    pub image_settings: Vec<String>,
}

impl PluginInfo {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            image_settings: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub inverted_image: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub image_settings: ImageEnhancement,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub plugins: Vec<PluginInfo>,
    #[serde(default)]
    pub playlist_config: PlaylistManager,
    #[serde(default)]
    pub refresh_info: Option<RefreshRecord>,
    /// Opaque per-plugin key/value storage.
    #[serde(default)]
    pub plugin_data: BTreeMap<String, Settings>,
}

fn default_version() -> u32 {
    1
}

fn default_name() -> String {
    "inkcycle".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Config {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            name: name.into(),
            resolution: Resolution::default(),
            orientation: Orientation::default(),
            inverted_image: false,
            timezone: default_timezone(),
            image_settings: ImageEnhancement::default(),
            scheduler: SchedulerConfig::default(),
            plugins: Vec::new(),
            playlist_config: PlaylistManager::default(),
            refresh_info: None,
            plugin_data: BTreeMap::new(),
        }
    }

    /// Config written by `inkcycle init`: the built-in plugins and one
    /// whole-day `Default` playlist showing a blank frame.
    pub fn starter(name: impl Into<String>) -> Self {
        let mut config = Self::new(name);
        config.plugins = vec![
            PluginInfo::new("blank", "Blank"),
            PluginInfo::new("image_file", "Image File"),
        ];
        let mut playlist = crate::playlist::Playlist::new(
            "Default",
            TimeOfDay::MIDNIGHT,
            TimeOfDay::END_OF_DAY,
        );
        playlist.plugins.push(PluginInstance::new(
            "blank",
            "white",
            Settings::new(),
            Duration::from_secs(3600),
        ));
        config.playlist_config.playlists.push(playlist);
        config
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        Self::load_from(&paths::config_path(root))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InkError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&data)?;
        config.playlist_config.normalize();
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        self.save_to(&paths::config_path(root))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------------

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| InkError::InvalidConfig(format!("unknown timezone '{}'", self.timezone)))
    }

    /// `now` as local wall-clock time in the configured timezone.
    /// Falls back to UTC when the timezone is invalid.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self.tz() {
            Ok(tz) => now.with_timezone(&tz).naive_local(),
            Err(_) => now.naive_utc(),
        }
    }

    /// Frame dimensions as a plugin should draw them, accounting for a
    /// vertical panel.
    pub fn oriented_dimensions(&self) -> (u32, u32) {
        let Resolution { width, height } = self.resolution;
        match self.orientation {
            Orientation::Horizontal => (width, height),
            Orientation::Vertical => (height, width),
        }
    }

    pub fn plugin(&self, plugin_id: &str) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| p.id == plugin_id)
    }

    // ---------------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.tz().is_err() {
            push(
                WarnLevel::Error,
                format!("unknown timezone '{}'", self.timezone),
            );
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            push(
                WarnLevel::Error,
                format!(
                    "resolution {}x{} has a zero dimension",
                    self.resolution.width, self.resolution.height
                ),
            );
        }

        for (name, factor) in self.image_settings.factors() {
            if !(0.0..=4.0).contains(&factor) {
                push(
                    WarnLevel::Warning,
                    format!("image_settings.{name}={factor} is outside 0.0..=4.0"),
                );
            }
        }

        let registered: HashSet<&str> = self.plugins.iter().map(|p| p.id.as_str()).collect();
        let mut seen_playlists = HashSet::new();
        for playlist in &self.playlist_config.playlists {
            if !seen_playlists.insert(playlist.name.as_str()) {
                push(
                    WarnLevel::Error,
                    format!("duplicate playlist name '{}'", playlist.name),
                );
            }
            let mut seen_instances = HashSet::new();
            for instance in &playlist.plugins {
                if !seen_instances.insert(instance.name.as_str()) {
                    push(
                        WarnLevel::Error,
                        format!(
                            "duplicate instance '{}' in playlist '{}'",
                            instance.name, playlist.name
                        ),
                    );
                }
                if !registered.contains(instance.plugin_id.as_str()) {
                    push(
                        WarnLevel::Warning,
                        format!(
                            "instance '{}' in playlist '{}' uses unregistered plugin '{}'",
                            instance.name, playlist.name, instance.plugin_id
                        ),
                    );
                }
            }
            if playlist.plugins.is_empty() {
                push(
                    WarnLevel::Warning,
                    format!("playlist '{}' has no instances", playlist.name),
                );
            }
        }

        warnings
    }
}
