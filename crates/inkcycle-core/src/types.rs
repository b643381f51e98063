use crate::error::InkError;
use chrono::{DateTime, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Plugin settings and plugin data values. Opaque to the scheduler.
pub type Settings = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Orientation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WriteOutcome
// ---------------------------------------------------------------------------

/// Result of a display write: whether the panel was actually redrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    Applied { image_hash: String },
    Skipped { image_hash: String },
}

impl WriteOutcome {
    pub fn image_hash(&self) -> &str {
        match self {
            Self::Applied { image_hash } | Self::Skipped { image_hash } => image_hash,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

// ---------------------------------------------------------------------------
// TimeOfDay
// ---------------------------------------------------------------------------

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minute-resolution time of day, serialized as `HH:MM`.
///
/// `24:00` is accepted so a window can end exactly at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn new(hour: u16, minute: u16) -> crate::Result<Self> {
        if minute > 59 || hour > 24 || (hour == 24 && minute != 0) {
            return Err(InkError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(hour * 60 + minute))
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// `24:00` normalized to `00:00`.
    pub fn wrapped_minutes(self) -> u16 {
        self.0 % MINUTES_PER_DAY
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = InkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InkError::InvalidTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Time arithmetic
// ---------------------------------------------------------------------------

/// `at + by`, clamped to the latest representable instant. Intervals from
/// the config are unbounded, and a huge one means "not for a long time".
pub fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_parses_and_displays() {
        let t: TimeOfDay = "06:05".parse().unwrap();
        assert_eq!(t.minutes(), 365);
        assert_eq!(t.to_string(), "06:05");
    }

    #[test]
    fn time_of_day_accepts_end_of_day() {
        let t: TimeOfDay = "24:00".parse().unwrap();
        assert_eq!(t, TimeOfDay::END_OF_DAY);
        assert_eq!(t.wrapped_minutes(), 0);
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        for bad in ["24:01", "25:00", "7", "07:6", "aa:bb", "12:60", ""] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn time_of_day_yaml_roundtrip_is_quoted_string() {
        let t = TimeOfDay::new(22, 0).unwrap();
        let yaml = serde_yaml::to_string(&t).unwrap();
        let back: TimeOfDay = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn saturating_add_clamps_huge_intervals() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            saturating_add(at, Duration::from_secs(90)),
            at + TimeDelta::seconds(90)
        );
        assert_eq!(
            saturating_add(at, Duration::from_secs(10_000_000_000_000)),
            DateTime::<Utc>::MAX_UTC
        );
        assert_eq!(saturating_add(at, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn write_outcome_serializes_with_status_tag() {
        let outcome = WriteOutcome::Skipped {
            image_hash: "abc".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["image_hash"], "abc");
        assert!(!outcome.is_applied());
    }
}
