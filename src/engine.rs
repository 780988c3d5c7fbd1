//! Alarm trigger engine.
//!
//! The engine decides which alarms are due on each poll, makes sure every
//! alarm fires at most once per matching minute, and tracks the ringing
//! session. It never touches the alarm store: snoozing hands back a new
//! record for the caller to insert.
//!
//! ## Session states
//!
//! ```text
//! Idle -> Ringing -> Idle        (dismiss or snooze)
//! ```
//!
//! Alarms that become due while another one is ringing wait in a FIFO
//! queue and ring in turn once the current session ends.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    num::NonZeroU32,
};

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info};

use crate::alarm::{Alarm, AlarmId, AlarmTime, RepeatDays};

/// The (date, minute) an alarm last fired at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    date: NaiveDate,
    time: AlarmTime,
}

impl TriggerKey {
    #[must_use]
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            date: now.date(),
            time: AlarmTime::from_time(now.time()),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Ringing,
}

/// Result of snoozing the ringing alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snooze {
    /// The alarm that was ringing, unchanged.
    pub original: Alarm,
    /// A fresh one-shot alarm for the store to insert.
    pub replacement: Alarm,
}

#[derive(Debug, Default)]
pub struct TriggerEngine {
    triggered: HashMap<AlarmId, TriggerKey>,
    ringing: Option<Alarm>,
    queued: VecDeque<Alarm>,
}

impl TriggerEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports every alarm in `alarms` that is due at `now` and has not
    /// already fired during this minute of this day.
    ///
    /// The trigger key is recorded before the alarm is returned, so calling
    /// `poll` again within the same minute never reports it twice. Due
    /// alarms also join the ringing session; the first one rings straight
    /// away when the session is idle.
    pub fn poll(&mut self, now: NaiveDateTime, alarms: &[Alarm]) -> Vec<Alarm> {
        let key = TriggerKey::at(now);
        let mut due = Vec::new();
        for alarm in alarms.iter().filter(|alarm| alarm.matches(now)) {
            if self.triggered.get(&alarm.id) == Some(&key) {
                continue;
            }
            self.triggered.insert(alarm.id.clone(), key);
            info!("alarm {} ({}) due at {key}", alarm.id, alarm.display_label());
            due.push(alarm.clone());
        }
        for alarm in &due {
            self.enqueue(alarm.clone());
        }
        due
    }

    fn enqueue(&mut self, alarm: Alarm) {
        let already_waiting = self
            .ringing
            .iter()
            .chain(&self.queued)
            .any(|waiting| waiting.id == alarm.id);
        if already_waiting {
            debug!("alarm {} is already in the ringing session", alarm.id);
            return;
        }
        if self.ringing.is_none() {
            self.ringing = Some(alarm);
        } else {
            self.queued.push_back(alarm);
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        if self.ringing.is_some() {
            SessionState::Ringing
        } else {
            SessionState::Idle
        }
    }

    #[must_use]
    pub const fn ringing(&self) -> Option<&Alarm> {
        self.ringing.as_ref()
    }

    /// Alarms that are due but waiting for the current one to end.
    pub fn queued(&self) -> impl Iterator<Item = &Alarm> {
        self.queued.iter()
    }

    /// The trigger key recorded for `id`, if it has ever fired.
    #[must_use]
    pub fn last_triggered(&self, id: &AlarmId) -> Option<TriggerKey> {
        self.triggered.get(id).copied()
    }

    /// Ends the ringing session and returns the alarm that was ringing.
    /// Does nothing when idle. Does not disable one-shot alarms.
    pub fn dismiss(&mut self) -> Option<Alarm> {
        let dismissed = self.end_session()?;
        info!("alarm {} dismissed", dismissed.id);
        Some(dismissed)
    }

    /// Snoozes the ringing alarm by its own `snooze_minutes`.
    pub fn snooze(&mut self, now: NaiveDateTime) -> Option<Snooze> {
        let minutes = self.ringing.as_ref()?.snooze_minutes;
        self.snooze_for(now, minutes)
    }

    /// Ends the ringing session and builds a one-shot copy of the ringing
    /// alarm set for `now + minutes`, truncated to the minute. The copy has
    /// a new id so it carries no trigger history. Past midnight the time
    /// simply wraps and the copy rings on the following day.
    ///
    /// Whole-day snoozes land on the current minute; the copy is then
    /// marked as fired for this minute so it first rings a day later.
    pub fn snooze_for(&mut self, now: NaiveDateTime, minutes: NonZeroU32) -> Option<Snooze> {
        let original = self.end_session()?;
        let until = now + Duration::minutes(i64::from(minutes.get()));
        let replacement = Alarm {
            id: AlarmId::generate(),
            time: AlarmTime::from_time(until.time()),
            enabled: true,
            repeat_days: RepeatDays::every_day(),
            created_at: Utc::now(),
            ..original.clone()
        };
        let key = TriggerKey::at(now);
        if replacement.time == key.time {
            self.triggered.insert(replacement.id.clone(), key);
        }
        info!(
            "alarm {} snoozed for {minutes} minutes until {}",
            original.id, replacement.time
        );
        Some(Snooze {
            original,
            replacement,
        })
    }

    fn end_session(&mut self) -> Option<Alarm> {
        let ended = self.ringing.take()?;
        self.ringing = self.queued.pop_front();
        Some(ended)
    }
}
