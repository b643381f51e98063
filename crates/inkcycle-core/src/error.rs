use thiserror::Error;

#[derive(Debug, Error)]
pub enum InkError {
    #[error("config not found: {0} (run 'inkcycle init')")]
    ConfigNotFound(String),

    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("plugin instance '{instance}' not found in playlist '{playlist}'")]
    PluginInstanceNotFound { playlist: String, instance: String },

    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("playlist already exists: {0}")]
    PlaylistExists(String),

    #[error("plugin instance '{instance}' already exists in playlist '{playlist}'")]
    PluginInstanceExists { playlist: String, instance: String },

    #[error("content resolution failed for plugin '{plugin_id}': {message}")]
    ContentResolution { plugin_id: String, message: String },

    #[error("device write failed: {0}")]
    DeviceWrite(String),

    #[error("config persist failed: {0}")]
    ConfigPersist(String),

    #[error("invalid time '{0}': expected HH:MM between 00:00 and 24:00")]
    InvalidTime(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("refresh scheduler is not running")]
    SchedulerStopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl InkError {
    /// Stable snake_case failure kind for structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlaylistNotFound(_)
            | Self::PluginInstanceNotFound { .. }
            | Self::PluginNotFound(_)
            | Self::ConfigNotFound(_) => "not_found",
            Self::PlaylistExists(_) | Self::PluginInstanceExists { .. } => "conflict",
            Self::ContentResolution { .. } => "content_resolution",
            Self::DeviceWrite(_) => "device_write",
            Self::ConfigPersist(_) => "config_persist",
            Self::InvalidTime(_) | Self::InvalidConfig(_) => "invalid_input",
            Self::SchedulerStopped => "scheduler_stopped",
            Self::Io(_) | Self::Yaml(_) => "internal",
        }
    }

    /// The plugin id a failure is attributed to, when there is one.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::ContentResolution { plugin_id, .. } => Some(plugin_id),
            Self::PluginNotFound(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == "not_found"
    }
}

pub type Result<T> = std::result::Result<T, InkError>;
