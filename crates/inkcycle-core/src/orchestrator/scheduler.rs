//! The refresh state machine.
//!
//! `Scheduler` owns every piece of mutable rotation state. It is driven by
//! the worker in [`super::worker`], which is its only caller outside tests.

use super::action::{RefreshAction, RefreshKind, RefreshRecord};
use crate::config::PluginInfo;
use crate::display::DisplayManager;
use crate::error::{InkError, Result};
use crate::playlist::PluginInstance;
use crate::provider::{self, ProviderRegistry, RenderContext};
use crate::store::ConfigStore;
use crate::types::{saturating_add, Settings, TimeOfDay, WriteOutcome};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock source. Playlist windows and due times are evaluated against
/// it; sleeping always uses the tokio timer.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// SchedulerState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    /// No active playlist (or an empty one); waiting for a re-check.
    Idle,
    /// Sleeping until a known due time.
    Scheduled { wake_at: DateTime<Utc> },
    /// Resolving content and writing it.
    Processing { action: RefreshAction },
}

/// What the worker should do after an autonomous cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Idle,
    WakeAt(DateTime<Utc>),
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    store: Arc<ConfigStore>,
    display: DisplayManager,
    providers: ProviderRegistry,
    clock: Arc<dyn Clock>,
    /// Start of the last autonomous attempt, successful or not.
    last_cycle_at: Option<DateTime<Utc>>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        store: Arc<ConfigStore>,
        display: DisplayManager,
        providers: ProviderRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let last_cycle_at = store
            .get_refresh_record()
            .filter(|r| r.refresh_type == RefreshKind::Playlist)
            .map(|r| r.refresh_time);
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            store,
            display,
            providers,
            clock,
            last_cycle_at,
            state,
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    // ---------------------------------------------------------------------------
    // Submitted actions
    // ---------------------------------------------------------------------------

    /// Process one action to completion and return its write outcome.
    /// Every failure is returned to the caller; nothing here is retried.
    ///
    /// A `ConfigPersist` error can arrive after the frame was applied. The
    /// panel and the in-memory record then already show the new content and
    /// only the file on disk is stale, so resubmitting the same action is a
    /// successful skip.
    pub async fn process_action(&mut self, action: &RefreshAction) -> Result<WriteOutcome> {
        self.set_state(SchedulerState::Processing {
            action: action.clone(),
        });
        match action {
            RefreshAction::PlaylistRefresh {
                playlist,
                plugin_id,
                instance,
                force,
            } => {
                let outcome = self
                    .show_instance(action, playlist, plugin_id, instance, *force)
                    .await?;
                self.persist().await?;
                Ok(outcome)
            }
            RefreshAction::ManualRefresh {
                plugin_id,
                settings,
            } => {
                let info = self.registered_plugin(plugin_id)?;
                let image = self.render(plugin_id, settings).await?;
                let outcome = self
                    .display
                    .write(image, &info.image_settings, false)
                    .await?;
                if outcome.is_applied() {
                    self.record(action, &outcome);
                    self.persist().await?;
                }
                Ok(outcome)
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Autonomous rotation
    // ---------------------------------------------------------------------------

    /// Run one autonomous cycle: draw the next instance of the active
    /// playlist if it is due, then report when to wake up next.
    ///
    /// Never fails; errors are logged and the instance is retried when it
    /// comes due again.
    pub async fn autonomous_cycle(&mut self) -> Plan {
        let now = self.clock.now();
        let Some((playlist, instance)) = self.due_candidate(now) else {
            return Plan::Idle;
        };

        if self.due_time(&instance).map_or(true, |due| due <= now) {
            self.last_cycle_at = Some(now);
            if let Err(e) = self.rotate(&playlist, &instance, now).await {
                warn!(
                    playlist = %playlist,
                    plugin_id = e.plugin_id().unwrap_or(&instance.plugin_id),
                    error = %e,
                    "autonomous refresh failed; will retry when due"
                );
            }
        } else {
            debug!(playlist = %playlist, instance = %instance.name, "next instance not due yet");
        }

        self.plan_wake(now)
    }

    /// The active, non-empty playlist and the instance it would show next.
    fn due_candidate(&self, now: DateTime<Utc>) -> Option<(String, PluginInstance)> {
        self.store.read(|c| {
            let local = c.local_time(now);
            let active = c
                .playlist_config
                .determine_active_playlist(TimeOfDay::from_time(local.time()))?;
            let instance = active.peek_next_instance()?.clone();
            Some((active.name.clone(), instance))
        })
    }

    /// Due time of `instance`: its own refresh interval, bounded below by
    /// the global dwell since the last autonomous attempt. `None` means now.
    fn due_time(&self, instance: &PluginInstance) -> Option<DateTime<Utc>> {
        let cycle = self.store.read(|c| c.scheduler.cycle_interval());
        let dwell = self.last_cycle_at.map(|t| saturating_add(t, cycle));
        instance.due_at().max(dwell)
    }

    /// Draw `instance`, the one the cursor points to next, and advance the
    /// cursor only once the draw succeeded. A failed draw leaves the playlist
    /// untouched so the same instance is retried when it comes due again.
    async fn rotate(
        &mut self,
        playlist: &str,
        instance: &PluginInstance,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome> {
        let action = RefreshAction::PlaylistRefresh {
            playlist: playlist.to_string(),
            plugin_id: instance.plugin_id.clone(),
            instance: instance.name.clone(),
            force: false,
        };
        self.set_state(SchedulerState::Processing {
            action: action.clone(),
        });
        info!(
            playlist = %playlist,
            instance = %instance.name,
            plugin_id = %instance.plugin_id,
            at = %now,
            "rotating playlist"
        );
        let outcome = self
            .show_instance(&action, playlist, &instance.plugin_id, &instance.name, false)
            .await?;
        self.store
            .update(|c| c.playlist_config.next_instance(playlist))?
            .ok_or_else(|| InkError::PlaylistNotFound(playlist.to_string()))?;
        self.persist().await?;
        Ok(outcome)
    }

    /// Compute the next wake-up after a cycle at `now`.
    fn plan_wake(&self, now: DateTime<Utc>) -> Plan {
        let Some((playlist, instance)) = self.due_candidate(now) else {
            return Plan::Idle;
        };
        let (window_end, max_sleep) = self.store.read(|c| {
            let local = c.local_time(now);
            let end = c
                .playlist_config
                .get_playlist(&playlist)
                .ok()
                .and_then(|p| p.window_end_after(local))
                .map(|end| now + (end - local));
            (end, c.scheduler.max_sleep())
        });
        let ceiling = saturating_add(now, max_sleep);

        let mut wake = ceiling;
        if let Some(due) = self.due_time(&instance) {
            wake = wake.min(due);
        } else {
            wake = now;
        }
        if let Some(end) = window_end {
            wake = wake.min(end);
        }
        Plan::WakeAt(wake)
    }

    // ---------------------------------------------------------------------------
    // Shared steps
    // ---------------------------------------------------------------------------

    /// Resolve, write and book-keep one playlist instance. Updates the
    /// instance timestamp on both outcomes and the refresh record only when
    /// the write was applied. Does not persist.
    async fn show_instance(
        &mut self,
        action: &RefreshAction,
        playlist: &str,
        plugin_id: &str,
        instance: &str,
        force: bool,
    ) -> Result<WriteOutcome> {
        let settings = self.store.read(|c| {
            c.playlist_config
                .find_instance(playlist, plugin_id, instance)
                .map(|i| i.settings.clone())
        })?;
        let info = self.registered_plugin(plugin_id)?;
        let image = self.render(plugin_id, &settings).await?;
        let outcome = self
            .display
            .write(image, &info.image_settings, force)
            .await?;

        let drawn_at = self.clock.now();
        self.store.update(|c| {
            c.playlist_config
                .get_playlist_mut(playlist)
                .and_then(|p| p.mark_drawn(plugin_id, instance, drawn_at))
        })?;
        if outcome.is_applied() {
            self.record(action, &outcome);
        } else {
            debug!(playlist = %playlist, instance = %instance, "content unchanged; panel not redrawn");
        }
        Ok(outcome)
    }

    fn registered_plugin(&self, plugin_id: &str) -> Result<PluginInfo> {
        let info = self.store.get_plugin_registry_entry(plugin_id)?;
        self.providers.get(plugin_id)?;
        Ok(info)
    }

    /// Run the provider on the blocking pool.
    async fn render(&self, plugin_id: &str, settings: &Settings) -> Result<DynamicImage> {
        let provider = self.providers.get(plugin_id)?;
        let ctx = self.render_context();
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || provider::render_with(&*provider, &settings, &ctx))
            .await
            .map_err(|e| InkError::ContentResolution {
                plugin_id: plugin_id.to_string(),
                message: format!("render task aborted: {e}"),
            })?
    }

    fn render_context(&self) -> RenderContext {
        let now = self.clock.now();
        self.store.read(|c| {
            let (width, height) = c.oriented_dimensions();
            RenderContext {
                width,
                height,
                timezone: c.tz().unwrap_or(Tz::UTC),
                now,
            }
        })
    }

    fn record(&self, action: &RefreshAction, outcome: &WriteOutcome) {
        let record = RefreshRecord::for_action(action, outcome.image_hash(), self.clock.now());
        self.store.set_refresh_record(record);
    }

    async fn persist(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.persist())
            .await
            .map_err(|e| InkError::ConfigPersist(format!("persist task aborted: {e}")))?
    }
}

/// Sleep length for a plan. Never shorter than `floor` so a persistently
/// failing instance cannot spin the worker.
pub(crate) fn sleep_for(
    plan: Plan,
    now: DateTime<Utc>,
    idle_recheck: Duration,
    floor: Duration,
) -> Duration {
    match plan {
        Plan::Idle => idle_recheck,
        Plan::WakeAt(at) => (at - now).to_std().unwrap_or(Duration::ZERO).max(floor),
    }
}
