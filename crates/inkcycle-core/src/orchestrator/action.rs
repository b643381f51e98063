//! Refresh action data model.
//!
//! A `RefreshAction` is what a caller asks the scheduler to show; a
//! `RefreshRecord` is the persisted trace of the last write that actually
//! reached the panel.

use crate::types::Settings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RefreshAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshAction {
    /// Show a specific instance that belongs to a playlist.
    PlaylistRefresh {
        playlist: String,
        plugin_id: String,
        instance: String,
        #[serde(default)]
        force: bool,
    },
    /// Render ad hoc content that is not part of any playlist.
    ManualRefresh {
        plugin_id: String,
        #[serde(default)]
        settings: Settings,
    },
}

impl RefreshAction {
    pub fn kind(&self) -> RefreshKind {
        match self {
            Self::PlaylistRefresh { .. } => RefreshKind::Playlist,
            Self::ManualRefresh { .. } => RefreshKind::Manual,
        }
    }

    pub fn plugin_id(&self) -> &str {
        match self {
            Self::PlaylistRefresh { plugin_id, .. } | Self::ManualRefresh { plugin_id, .. } => {
                plugin_id
            }
        }
    }
}

impl fmt::Display for RefreshAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaylistRefresh {
                playlist, instance, ..
            } => write!(f, "playlist {playlist}/{instance}"),
            Self::ManualRefresh { plugin_id, .. } => write!(f, "manual {plugin_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshKind {
    Playlist,
    Manual,
}

impl RefreshKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshKind::Playlist => "playlist",
            RefreshKind::Manual => "manual",
        }
    }
}

impl fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RefreshRecord
// ---------------------------------------------------------------------------

/// The most recent write that was applied to the panel. Skipped writes
/// never produce a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub refresh_time: DateTime<Utc>,
    pub image_hash: String,
    pub refresh_type: RefreshKind,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_instance: Option<String>,
}

impl RefreshRecord {
    pub fn for_action(
        action: &RefreshAction,
        image_hash: impl Into<String>,
        refresh_time: DateTime<Utc>,
    ) -> Self {
        let (playlist, plugin_instance) = match action {
            RefreshAction::PlaylistRefresh {
                playlist, instance, ..
            } => (Some(playlist.clone()), Some(instance.clone())),
            RefreshAction::ManualRefresh { .. } => (None, None),
        };
        Self {
            refresh_time,
            image_hash: image_hash.into(),
            refresh_type: action.kind(),
            plugin_id: action.plugin_id().to_string(),
            playlist,
            plugin_instance,
        }
    }
}
