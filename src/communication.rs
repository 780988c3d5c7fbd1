use crate::alarm::{Alarm, AlarmId, AlarmTime};

/// Sent by the scheduler to whoever renders alarms and plays sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub alarm_id: AlarmId,
}

impl Message {
    #[must_use]
    pub const fn new(kind: MessageType, alarm_id: AlarmId) -> Self {
        Self { kind, alarm_id }
    }

    #[must_use]
    pub fn triggered(alarm: &Alarm) -> Self {
        Self::new(
            MessageType::AlarmTriggered {
                label: alarm.display_label().to_string(),
                time: alarm.time,
                vibration: alarm.vibration,
                math_challenge: alarm.math_challenge,
            },
            alarm.id.clone(),
        )
    }

    #[must_use]
    pub fn queued(alarm: &Alarm) -> Self {
        Self::new(
            MessageType::AlarmQueued {
                label: alarm.display_label().to_string(),
                time: alarm.time,
            },
            alarm.id.clone(),
        )
    }

    #[must_use]
    pub fn stopped(alarm: &Alarm, outcome: StopOutcome) -> Self {
        Self::new(MessageType::AlarmStopped(outcome), alarm.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    AlarmTriggered {
        label: String,
        time: AlarmTime,
        vibration: bool,
        math_challenge: bool,
    },
    /// due while another alarm is ringing, it rings once that one ends
    AlarmQueued { label: String, time: AlarmTime },
    // the ringing session for this alarm is over
    AlarmStopped(StopOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Dismissed,
    Snoozed { until: AlarmTime },
    /// the scheduler was torn down while the alarm rang
    Shutdown,
}

/// Sent by the presentation layer to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Dismiss,
    Snooze,
    Shutdown,
}
