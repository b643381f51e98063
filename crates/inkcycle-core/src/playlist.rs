//! Playlists: named, time-windowed rotations of plugin instances.
//!
//! `PlaylistManager` decides which playlist is active for a time of day and
//! advances rotation cursors. Only the refresh scheduler calls the mutating
//! rotation methods (`next_instance`, `mark_drawn`); configuration tooling
//! uses the add/remove helpers, which keep the cursor invariant intact.

use crate::error::{InkError, Result};
use crate::types::{saturating_add, Settings, TimeOfDay, MINUTES_PER_DAY};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

// ---------------------------------------------------------------------------
// PluginInstance
// ---------------------------------------------------------------------------

/// One configured occurrence of a plugin inside a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstance {
    pub plugin_id: String,
    /// Unique within the owning playlist.
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    /// Minimum time between two draws of this instance.
    #[serde(
        rename = "refresh_interval_seconds",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration",
        default = "default_refresh_interval"
    )]
    pub refresh_interval: Duration,
    #[serde(default)]
    pub latest_refresh_time: Option<DateTime<Utc>>,
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(3600)
}

impl PluginInstance {
    pub fn new(
        plugin_id: impl Into<String>,
        name: impl Into<String>,
        settings: Settings,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            name: name.into(),
            settings,
            refresh_interval,
            latest_refresh_time: None,
        }
    }

    /// Earliest instant at which this instance may be drawn again.
    /// `None` means it has never been drawn and is due immediately.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.latest_refresh_time
            .map(|t| saturating_add(t, self.refresh_interval))
    }
}

// ---------------------------------------------------------------------------
// Playlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(default)]
    pub plugins: Vec<PluginInstance>,
    /// Index of the instance shown last. Always a valid index or absent.
    #[serde(default)]
    pub current_index: Option<usize>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, start_time: TimeOfDay, end_time: TimeOfDay) -> Self {
        Self {
            name: name.into(),
            start_time,
            end_time,
            plugins: Vec::new(),
            current_index: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn covers_whole_day(&self) -> bool {
        self.start_time.wrapped_minutes() == self.end_time.wrapped_minutes()
    }

    /// Whether the window contains `now`. Windows with `start > end` wrap
    /// past midnight; `start == end` covers the whole day.
    pub fn is_active_at(&self, now: TimeOfDay) -> bool {
        if self.covers_whole_day() {
            return true;
        }
        let start = self.start_time.wrapped_minutes();
        let end = self.end_time.minutes();
        let t = now.wrapped_minutes();
        if start < end {
            start <= t && t < end
        } else {
            t >= start || t < self.end_time.wrapped_minutes()
        }
    }

    /// Window length in minutes, used by the `most_specific` overlap policy.
    pub fn window_minutes(&self) -> u16 {
        if self.covers_whole_day() {
            return MINUTES_PER_DAY;
        }
        let start = self.start_time.wrapped_minutes();
        let end = self.end_time.wrapped_minutes();
        if start < end {
            end - start
        } else {
            MINUTES_PER_DAY - start + end
        }
    }

    /// The next local instant, strictly after `now`, at which the window
    /// closes. `None` for whole-day windows.
    pub fn window_end_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.covers_whole_day() {
            return None;
        }
        let end = i64::from(self.end_time.wrapped_minutes());
        let midnight = now.date().and_hms_opt(0, 0, 0)?;
        let candidate = midnight + ChronoDuration::minutes(end);
        if candidate > now {
            Some(candidate)
        } else {
            Some(candidate + ChronoDuration::days(1))
        }
    }

    /// Index `next_instance` would move to, without moving.
    pub fn peek_next_index(&self) -> Option<usize> {
        if self.plugins.is_empty() {
            return None;
        }
        Some(self.current_index.map_or(0, |c| (c + 1) % self.plugins.len()))
    }

    /// The instance due next in rotation. Read-only.
    pub fn peek_next_instance(&self) -> Option<&PluginInstance> {
        self.peek_next_index().map(|i| &self.plugins[i])
    }

    /// Commit to showing the next instance: advance the cursor (with
    /// wraparound) and return the instance now under it.
    pub fn next_instance(&mut self) -> Option<&PluginInstance> {
        let index = self.peek_next_index()?;
        self.current_index = Some(index);
        self.plugins.get(index)
    }

    pub fn find_instance(&self, plugin_id: &str, name: &str) -> Result<&PluginInstance> {
        self.plugins
            .iter()
            .find(|p| p.plugin_id == plugin_id && p.name == name)
            .ok_or_else(|| InkError::PluginInstanceNotFound {
                playlist: self.name.clone(),
                instance: name.to_string(),
            })
    }

    pub fn find_instance_mut(&mut self, plugin_id: &str, name: &str) -> Result<&mut PluginInstance> {
        let playlist = self.name.clone();
        self.plugins
            .iter_mut()
            .find(|p| p.plugin_id == plugin_id && p.name == name)
            .ok_or_else(|| InkError::PluginInstanceNotFound {
                playlist,
                instance: name.to_string(),
            })
    }

    /// Record that an instance was drawn at `at`.
    pub fn mark_drawn(&mut self, plugin_id: &str, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.find_instance_mut(plugin_id, name)?.latest_refresh_time = Some(at);
        Ok(())
    }

    pub fn add_instance(&mut self, instance: PluginInstance) -> Result<()> {
        if self.plugins.iter().any(|p| p.name == instance.name) {
            return Err(InkError::PluginInstanceExists {
                playlist: self.name.clone(),
                instance: instance.name,
            });
        }
        self.plugins.push(instance);
        Ok(())
    }

    /// Remove an instance by name, shifting the cursor so rotation resumes
    /// with the instance that followed the removed one.
    pub fn remove_instance(&mut self, name: &str) -> Result<PluginInstance> {
        let index = self
            .plugins
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| InkError::PluginInstanceNotFound {
                playlist: self.name.clone(),
                instance: name.to_string(),
            })?;
        let removed = self.plugins.remove(index);
        self.current_index = match self.current_index {
            _ if self.plugins.is_empty() => None,
            Some(c) if c >= index => c.checked_sub(1),
            other => other,
        };
        self.normalize();
        Ok(removed)
    }

    /// Drop a cursor that no longer points at an instance.
    pub fn normalize(&mut self) {
        if self.current_index.is_some_and(|c| c >= self.plugins.len()) {
            self.current_index = None;
        }
    }
}

// ---------------------------------------------------------------------------
// OverlapPolicy
// ---------------------------------------------------------------------------

/// Tie-break when several playlist windows contain the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// The first matching playlist in declaration order.
    #[default]
    FirstDeclared,
    /// The shortest matching window; ties fall back to declaration order.
    MostSpecific,
}

// ---------------------------------------------------------------------------
// PlaylistManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistManager {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

impl PlaylistManager {
    pub fn new(playlists: Vec<Playlist>) -> Self {
        Self {
            playlists,
            overlap_policy: OverlapPolicy::default(),
        }
    }

    /// The playlist whose window contains `now`, or `None` when no window
    /// matches (the scheduler then idles).
    pub fn determine_active_playlist(&self, now: TimeOfDay) -> Option<&Playlist> {
        let mut active = self.playlists.iter().filter(|p| p.is_active_at(now));
        match self.overlap_policy {
            OverlapPolicy::FirstDeclared => active.next(),
            // min_by_key keeps the first of equal keys, preserving declaration order.
            OverlapPolicy::MostSpecific => active.min_by_key(|p| p.window_minutes()),
        }
    }

    pub fn get_playlist(&self, name: &str) -> Result<&Playlist> {
        self.playlists
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| InkError::PlaylistNotFound(name.to_string()))
    }

    pub fn get_playlist_mut(&mut self, name: &str) -> Result<&mut Playlist> {
        self.playlists
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| InkError::PlaylistNotFound(name.to_string()))
    }

    /// Advance the named playlist's cursor. See [`Playlist::next_instance`].
    pub fn next_instance(&mut self, playlist: &str) -> Result<Option<PluginInstance>> {
        Ok(self.get_playlist_mut(playlist)?.next_instance().cloned())
    }

    pub fn find_instance(
        &self,
        playlist: &str,
        plugin_id: &str,
        instance: &str,
    ) -> Result<&PluginInstance> {
        self.get_playlist(playlist)?.find_instance(plugin_id, instance)
    }

    pub fn add_playlist(&mut self, name: &str, start: TimeOfDay, end: TimeOfDay) -> Result<()> {
        if self.playlists.iter().any(|p| p.name == name) {
            return Err(InkError::PlaylistExists(name.to_string()));
        }
        self.playlists.push(Playlist::new(name, start, end));
        Ok(())
    }

    pub fn update_playlist_window(
        &mut self,
        name: &str,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<()> {
        let playlist = self.get_playlist_mut(name)?;
        playlist.start_time = start;
        playlist.end_time = end;
        Ok(())
    }

    pub fn delete_playlist(&mut self, name: &str) -> Result<Playlist> {
        let index = self
            .playlists
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| InkError::PlaylistNotFound(name.to_string()))?;
        Ok(self.playlists.remove(index))
    }

    pub fn add_instance(&mut self, playlist: &str, instance: PluginInstance) -> Result<()> {
        self.get_playlist_mut(playlist)?.add_instance(instance)
    }

    pub fn remove_instance(&mut self, playlist: &str, name: &str) -> Result<PluginInstance> {
        self.get_playlist_mut(playlist)?.remove_instance(name)
    }

    pub fn normalize(&mut self) {
        for playlist in &mut self.playlists {
            playlist.normalize();
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for Duration (serialized as seconds: u64)
// ---------------------------------------------------------------------------

fn serialize_duration<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u64(d.as_secs())
}

fn deserialize_duration<'de, D>(d: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Duration::from_secs(u64::deserialize(d)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn instance(plugin_id: &str, name: &str) -> PluginInstance {
        PluginInstance::new(plugin_id, name, Settings::new(), Duration::from_secs(300))
    }

    fn playlist(name: &str, start: &str, end: &str, instances: &[&str]) -> Playlist {
        let mut p = Playlist::new(name, tod(start), tod(end));
        for n in instances {
            p.add_instance(instance(n, n)).unwrap();
        }
        p
    }

    #[test]
    fn non_wrapping_window_contains_only_its_range() {
        let p = playlist("Morning", "06:00", "09:00", &[]);
        assert!(p.is_active_at(tod("06:00")));
        assert!(p.is_active_at(tod("08:59")));
        assert!(!p.is_active_at(tod("09:00")));
        assert!(!p.is_active_at(tod("05:59")));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        let p = playlist("Night", "22:00", "06:00", &[]);
        assert!(p.is_active_at(tod("23:30")));
        assert!(p.is_active_at(tod("03:00")));
        assert!(!p.is_active_at(tod("12:00")));
    }

    #[test]
    fn end_of_day_and_equal_bounds_cover_whole_day() {
        let default = playlist("Default", "00:00", "24:00", &[]);
        let same = playlist("Same", "07:00", "07:00", &[]);
        for t in ["00:00", "12:00", "23:59"] {
            assert!(default.is_active_at(tod(t)));
            assert!(same.is_active_at(tod(t)));
        }
        assert_eq!(default.window_minutes(), MINUTES_PER_DAY);
    }

    #[test]
    fn evening_window_ending_at_midnight() {
        let p = playlist("Evening", "18:00", "24:00", &[]);
        assert!(p.is_active_at(tod("23:59")));
        assert!(!p.is_active_at(tod("00:00")));
        assert_eq!(p.window_minutes(), 360);
    }

    #[test]
    fn active_playlist_picks_containing_window() {
        let pm = PlaylistManager::new(vec![
            playlist("Morning", "06:00", "09:00", &["a"]),
            playlist("Day", "09:00", "18:00", &["b"]),
        ]);
        assert_eq!(
            pm.determine_active_playlist(tod("07:00")).unwrap().name,
            "Morning"
        );
        assert_eq!(pm.determine_active_playlist(tod("12:00")).unwrap().name, "Day");
        assert!(pm.determine_active_playlist(tod("20:00")).is_none());
    }

    #[test]
    fn overlapping_windows_first_declared_wins() {
        let pm = PlaylistManager::new(vec![
            playlist("Default", "00:00", "24:00", &[]),
            playlist("Morning", "06:00", "09:00", &[]),
        ]);
        assert_eq!(
            pm.determine_active_playlist(tod("07:00")).unwrap().name,
            "Default"
        );
    }

    #[test]
    fn overlapping_windows_most_specific_policy() {
        let mut pm = PlaylistManager::new(vec![
            playlist("Default", "00:00", "24:00", &[]),
            playlist("Morning", "06:00", "09:00", &[]),
            playlist("AlsoMorning", "06:00", "09:00", &[]),
        ]);
        pm.overlap_policy = OverlapPolicy::MostSpecific;
        assert_eq!(
            pm.determine_active_playlist(tod("07:00")).unwrap().name,
            "Morning"
        );
        assert_eq!(
            pm.determine_active_playlist(tod("10:00")).unwrap().name,
            "Default"
        );
    }

    #[test]
    fn next_instance_wraps_around() {
        let mut p = playlist("P", "00:00", "24:00", &["a", "b", "c"]);
        p.current_index = Some(2);
        let next = p.next_instance().unwrap();
        assert_eq!(next.name, "a");
        assert_eq!(p.current_index, Some(0));
    }

    #[test]
    fn next_instance_on_empty_playlist_is_none() {
        let mut p = playlist("Empty", "00:00", "24:00", &[]);
        assert!(p.next_instance().is_none());
        assert_eq!(p.current_index, None);
    }

    #[test]
    fn fresh_playlist_starts_at_first_instance() {
        let mut p = playlist("P", "00:00", "24:00", &["a", "b"]);
        assert_eq!(p.peek_next_instance().unwrap().name, "a");
        assert_eq!(p.next_instance().unwrap().name, "a");
        assert_eq!(p.peek_next_instance().unwrap().name, "b");
    }

    #[test]
    fn peek_does_not_move_cursor() {
        let p = playlist("P", "00:00", "24:00", &["a", "b"]);
        p.peek_next_instance();
        p.peek_next_instance();
        assert_eq!(p.current_index, None);
    }

    #[test]
    fn find_instance_reports_not_found() {
        let pm = PlaylistManager::new(vec![playlist("P", "00:00", "24:00", &["a"])]);
        assert!(pm.find_instance("P", "a", "a").is_ok());
        assert!(matches!(
            pm.find_instance("P", "a", "zzz"),
            Err(InkError::PluginInstanceNotFound { .. })
        ));
        assert!(matches!(
            pm.find_instance("Nope", "a", "a"),
            Err(InkError::PlaylistNotFound(_))
        ));
    }

    #[test]
    fn remove_instance_keeps_cursor_valid() {
        let mut p = playlist("P", "00:00", "24:00", &["a", "b", "c"]);
        p.current_index = Some(1);
        p.remove_instance("b").unwrap();
        // rotation resumes with the instance that followed "b"
        assert_eq!(p.peek_next_instance().unwrap().name, "c");

        p.current_index = Some(1);
        p.remove_instance("c").unwrap();
        assert_eq!(p.current_index, Some(0));

        p.remove_instance("a").unwrap();
        assert_eq!(p.current_index, None);
    }

    #[test]
    fn remove_first_instance_under_cursor_restarts_rotation() {
        let mut p = playlist("P", "00:00", "24:00", &["a", "b"]);
        p.current_index = Some(0);
        p.remove_instance("a").unwrap();
        assert_eq!(p.current_index, None);
        assert_eq!(p.peek_next_instance().unwrap().name, "b");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut pm = PlaylistManager::default();
        pm.add_playlist("P", tod("00:00"), tod("24:00")).unwrap();
        assert!(matches!(
            pm.add_playlist("P", tod("01:00"), tod("02:00")),
            Err(InkError::PlaylistExists(_))
        ));
        pm.add_instance("P", instance("clock", "c")).unwrap();
        assert!(matches!(
            pm.add_instance("P", instance("weather", "c")),
            Err(InkError::PluginInstanceExists { .. })
        ));
    }

    #[test]
    fn normalize_drops_stale_cursor() {
        let mut pm = PlaylistManager::new(vec![playlist("P", "00:00", "24:00", &["a"])]);
        pm.playlists[0].current_index = Some(7);
        pm.normalize();
        assert_eq!(pm.playlists[0].current_index, None);
    }

    #[test]
    fn window_end_after_rolls_to_next_day() {
        let p = playlist("Morning", "06:00", "09:00", &[]);
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let at_7 = day.and_hms_opt(7, 0, 0).unwrap();
        assert_eq!(p.window_end_after(at_7), Some(day.and_hms_opt(9, 0, 0).unwrap()));
        let at_10 = day.and_hms_opt(10, 0, 0).unwrap();
        let next_day = day.succ_opt().unwrap();
        assert_eq!(
            p.window_end_after(at_10),
            Some(next_day.and_hms_opt(9, 0, 0).unwrap())
        );
        let whole = playlist("Default", "00:00", "24:00", &[]);
        assert_eq!(whole.window_end_after(at_7), None);
    }

    #[test]
    fn instance_due_after_refresh_interval() {
        let mut i = instance("clock", "c");
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(i.due_at(), None);
        i.latest_refresh_time = Some(t0);
        assert_eq!(i.due_at(), Some(t0 + ChronoDuration::seconds(300)));
    }

    #[test]
    fn huge_refresh_interval_saturates_instead_of_overflowing() {
        let mut i = instance("clock", "c");
        i.refresh_interval = Duration::from_secs(u64::MAX);
        i.latest_refresh_time = Some(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap());
        assert_eq!(i.due_at(), Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn playlist_yaml_uses_seconds_and_hhmm() {
        let p = playlist("Night", "22:00", "06:00", &["a"]);
        let yaml = serde_yaml::to_string(&p).unwrap();
        assert!(yaml.contains("refresh_interval_seconds: 300"));
        assert!(yaml.contains("22:00"));
        let back: Playlist = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, p);
    }
}
