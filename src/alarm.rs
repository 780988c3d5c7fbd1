use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::{DateTime, Datelike, Days, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::AlarmError;

pub const DEFAULT_SNOOZE_MINUTES: NonZeroU32 = match NonZeroU32::new(5) {
    Some(minutes) => minutes,
    None => unreachable!(),
};

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

const fn default_snooze() -> NonZeroU32 {
    DEFAULT_SNOOZE_MINUTES
}

fn default_tone() -> String {
    "default".to_string()
}

/// Opaque alarm identity.
/// records written by other front ends may use any string, new ones get a uuid
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(String);

impl AlarmId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AlarmId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AlarmId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock hour and minute (24h), stored as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, AlarmError> {
        if hour < 24 && minute < 60 {
            Ok(Self { hour, minute })
        } else {
            Err(AlarmError::InvalidTime(format!("{hour}:{minute}")))
        }
    }

    /// Drops seconds and below.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    #[must_use]
    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for AlarmTime {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AlarmError::InvalidTime(s.to_string());
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        // exactly two ascii digits on each side, "7:5" and "+7:05" are rejected
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hour) || !two_digits(minute) {
            return Err(invalid());
        }
        let hour = hour.parse().map_err(|_| invalid())?;
        let minute = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = AlarmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(time: AlarmTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Weekday ordinals, 0 = Sunday through 6 = Saturday.
/// An empty set means every day. Duplicates are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct RepeatDays(Vec<u8>);

impl RepeatDays {
    #[must_use]
    pub const fn every_day() -> Self {
        Self(Vec::new())
    }

    pub fn new(days: impl IntoIterator<Item = u8>) -> Result<Self, AlarmError> {
        let days: Vec<u8> = days.into_iter().collect();
        if let Some(bad) = days.iter().find(|day| **day > 6) {
            return Err(AlarmError::InvalidWeekday(*bad));
        }
        Ok(Self(days))
    }

    #[must_use]
    pub fn is_every_day(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn includes(&self, weekday: Weekday) -> bool {
        #[allow(clippy::cast_possible_truncation)]
        let ordinal = weekday.num_days_from_sunday() as u8;
        self.is_every_day() || self.0.contains(&ordinal)
    }

    #[must_use]
    pub fn days(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for RepeatDays {
    type Error = AlarmError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepeatDays> for Vec<u8> {
    fn from(days: RepeatDays) -> Self {
        days.0
    }
}

impl fmt::Display for RepeatDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
        if self.is_every_day() {
            return f.write_str("every day");
        }
        let names: Vec<&str> = self.0.iter().map(|day| NAMES[usize::from(*day)]).collect();
        f.write_str(&names.join(","))
    }
}

/// represents an alarm as it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: AlarmId,
    pub time: AlarmTime,
    #[serde(default)]
    pub label: String,
    #[serde(default = "always_true")]
    pub enabled: bool,
    #[serde(default)]
    pub repeat_days: RepeatDays,
    #[serde(default = "default_snooze")]
    pub snooze_minutes: NonZeroU32,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub vibration: bool,
    #[serde(default)]
    pub math_challenge: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Alarm {
    /// Whether `now` falls in this alarm's minute on a day it is allowed to ring.
    /// Does not look at dedup state, see [`crate::engine::TriggerEngine`].
    #[must_use]
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        self.enabled
            && self.time == AlarmTime::from_time(now.time())
            && self.repeat_days.includes(now.weekday())
    }

    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        self.repeat_days.is_every_day()
    }

    #[must_use]
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            "Alarm"
        } else {
            &self.label
        }
    }

    /// The first time strictly after `now` at which this alarm would ring.
    /// Looks a full week ahead so that a weekly alarm set for the current
    /// minute is found next week.
    #[must_use]
    pub fn next_occurrence(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        (0..=7)
            .filter_map(|offset| now.date().checked_add_days(Days::new(offset)))
            .filter(|date| self.repeat_days.includes(date.weekday()))
            .map(|date| date.and_time(self.time.to_naive_time()))
            .find(|candidate| *candidate > now)
    }
}

/// The enabled alarm that will ring soonest after `now`. Ties go to the
/// earliest alarm in `alarms`.
#[must_use]
pub fn next_alarm(alarms: &[Alarm], now: NaiveDateTime) -> Option<(&Alarm, NaiveDateTime)> {
    alarms
        .iter()
        .filter(|alarm| alarm.enabled)
        .filter_map(|alarm| alarm.next_occurrence(now).map(|at| (alarm, at)))
        .min_by_key(|(_, at)| *at)
}

/// true if an alarm other than `except` already uses `time`
#[must_use]
pub fn has_duplicate_time(alarms: &[Alarm], time: AlarmTime, except: Option<&AlarmId>) -> bool {
    alarms
        .iter()
        .any(|alarm| alarm.time == time && Some(&alarm.id) != except)
}

/// Collects the user-editable parts of an alarm before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmBuilder {
    time: AlarmTime,
    label: String,
    repeat_days: RepeatDays,
    snooze_minutes: NonZeroU32,
    tone: String,
    vibration: bool,
    math_challenge: bool,
}

impl AlarmBuilder {
    #[must_use]
    pub fn new(time: AlarmTime) -> Self {
        Self {
            time,
            label: String::new(),
            repeat_days: RepeatDays::every_day(),
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            tone: default_tone(),
            vibration: true,
            math_challenge: false,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn repeat_days(mut self, days: RepeatDays) -> Self {
        self.repeat_days = days;
        self
    }

    #[must_use]
    pub const fn snooze_minutes(mut self, minutes: NonZeroU32) -> Self {
        self.snooze_minutes = minutes;
        self
    }

    #[must_use]
    pub fn tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    #[must_use]
    pub const fn vibration(mut self, vibration: bool) -> Self {
        self.vibration = vibration;
        self
    }

    #[must_use]
    pub const fn math_challenge(mut self, math_challenge: bool) -> Self {
        self.math_challenge = math_challenge;
        self
    }

    #[must_use]
    pub fn build(self) -> Alarm {
        Alarm {
            id: AlarmId::generate(),
            time: self.time,
            label: self.label,
            enabled: true,
            repeat_days: self.repeat_days,
            snooze_minutes: self.snooze_minutes,
            tone: self.tone,
            vibration: self.vibration,
            math_challenge: self.math_challenge,
            created_at: Utc::now(),
        }
    }
}
