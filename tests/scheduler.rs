use std::{
    ops::ControlFlow,
    sync::mpsc::{self, Receiver},
};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use wakewise::{
    alarm::{Alarm, AlarmBuilder, AlarmTime, RepeatDays},
    clock::ManualClock,
    communication::{Command, Message, MessageType, StopOutcome},
    config::Config,
    engine::SessionState,
    error::RunError,
    scheduler::Scheduler,
    store::{AlarmStore, JsonAlarmStore, MemoryAlarmStore},
};

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    // a Monday
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn alarm_at(h: u8, m: u8) -> Alarm {
    AlarmBuilder::new(AlarmTime::new(h, m).unwrap()).build()
}

fn fast_config() -> Config {
    Config {
        poll_interval_ms: 1,
        ..Config::default()
    }
}

fn drain(events: &Receiver<Message>) -> Vec<Message> {
    events.try_iter().collect()
}

#[test]
fn tick_reports_triggered_and_queued_alarms() {
    let first = alarm_at(7, 0);
    let second = alarm_at(7, 0);
    let store = MemoryAlarmStore::with_alarms(vec![first.clone(), second.clone()]);
    let clock = ManualClock::new(at(7, 0, 0));
    let mut scheduler = Scheduler::new(store, clock.clone(), &Config::default());
    let (tx, rx) = mpsc::channel();

    assert_eq!(scheduler.tick(&tx).unwrap().len(), 2);
    assert_eq!(
        drain(&rx),
        vec![Message::triggered(&first), Message::queued(&second)]
    );

    clock.advance(Duration::seconds(1));
    assert!(scheduler.tick(&tx).unwrap().is_empty());

    scheduler.handle(Command::Dismiss, &tx).unwrap();
    assert_eq!(
        drain(&rx),
        vec![
            Message::stopped(&first, StopOutcome::Dismissed),
            Message::triggered(&second),
        ]
    );
}

#[test]
fn snooze_inserts_a_new_alarm_that_rings_later() {
    let alarm = alarm_at(7, 0);
    let store = MemoryAlarmStore::with_alarms(vec![alarm.clone()]);
    let clock = ManualClock::new(at(7, 0, 30));
    let mut scheduler = Scheduler::new(store.clone(), clock.clone(), &Config::default());
    let (tx, rx) = mpsc::channel();

    scheduler.tick(&tx).unwrap();
    scheduler.handle(Command::Snooze, &tx).unwrap();
    let until = AlarmTime::new(7, 5).unwrap();
    let events = drain(&rx);
    assert_eq!(
        events.last(),
        Some(&Message::stopped(&alarm, StopOutcome::Snoozed { until }))
    );

    let alarms = store.snapshot().unwrap();
    assert_eq!(alarms.len(), 2);
    let snoozed = alarms[1].clone();
    assert_eq!(snoozed.time, until);
    assert!(snoozed.repeat_days.is_every_day());

    clock.set(at(7, 5, 0));
    assert_eq!(scheduler.tick(&tx).unwrap(), vec![snoozed.clone()]);
    assert_eq!(drain(&rx), vec![Message::triggered(&snoozed)]);
}

#[test]
fn unreadable_store_only_delays_alarms() {
    let alarm = alarm_at(7, 0);
    let store = MemoryAlarmStore::with_alarms(vec![alarm.clone()]);
    let clock = ManualClock::new(at(7, 0, 0));
    let mut scheduler = Scheduler::new(store.clone(), clock.clone(), &Config::default());
    let (tx, rx) = mpsc::channel();

    store.set_unavailable(true);
    assert!(scheduler.tick(&tx).unwrap().is_empty());

    store.set_unavailable(false);
    clock.advance(Duration::seconds(1));
    assert_eq!(scheduler.tick(&tx).unwrap(), vec![alarm.clone()]);
    assert_eq!(drain(&rx), vec![Message::triggered(&alarm)]);
}

#[test]
fn snoozed_alarm_survives_a_store_outage() {
    let alarm = alarm_at(7, 0);
    let store = MemoryAlarmStore::with_alarms(vec![alarm.clone()]);
    let clock = ManualClock::new(at(7, 0, 30));
    let mut scheduler = Scheduler::new(store.clone(), clock.clone(), &Config::default());
    let (tx, rx) = mpsc::channel();

    scheduler.tick(&tx).unwrap();
    store.set_unavailable(true);
    scheduler.handle(Command::Snooze, &tx).unwrap();
    assert_eq!(scheduler.unsaved().len(), 1);
    let snoozed = scheduler.unsaved()[0].clone();
    assert_eq!(snoozed.time, AlarmTime::new(7, 5).unwrap());
    drain(&rx);

    // still down when it comes due: rings anyway
    clock.set(at(7, 5, 0));
    assert_eq!(scheduler.tick(&tx).unwrap(), vec![snoozed.clone()]);
    assert_eq!(drain(&rx), vec![Message::triggered(&snoozed)]);
    scheduler.handle(Command::Dismiss, &tx).unwrap();

    store.set_unavailable(false);
    clock.set(at(7, 6, 0));
    assert!(scheduler.tick(&tx).unwrap().is_empty());
    assert!(scheduler.unsaved().is_empty());
    assert_eq!(store.snapshot().unwrap(), vec![alarm, snoozed]);
}

#[test]
fn snoozed_alarm_is_saved_once_the_store_is_back() {
    let alarm = alarm_at(7, 0);
    let store = MemoryAlarmStore::with_alarms(vec![alarm.clone()]);
    let clock = ManualClock::new(at(7, 0, 30));
    let mut scheduler = Scheduler::new(store.clone(), clock.clone(), &Config::default());
    let (tx, rx) = mpsc::channel();

    scheduler.tick(&tx).unwrap();
    store.set_unavailable(true);
    scheduler.handle(Command::Snooze, &tx).unwrap();
    store.set_unavailable(false);

    clock.set(at(7, 1, 0));
    assert!(scheduler.tick(&tx).unwrap().is_empty());
    assert!(scheduler.unsaved().is_empty());
    let alarms = store.snapshot().unwrap();
    assert_eq!(alarms.len(), 2);
    let snoozed = alarms[1].clone();
    drain(&rx);

    clock.set(at(7, 5, 0));
    assert_eq!(scheduler.tick(&tx).unwrap(), vec![snoozed.clone()]);
    assert_eq!(drain(&rx), vec![Message::triggered(&snoozed)]);
}

#[test]
fn malformed_records_do_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "broken", "time": "seven o'clock"},
            {"id": "ok", "time": "07:00", "label": "Coffee", "repeatDays": [1]}
        ]"#,
    )
    .unwrap();
    let clock = ManualClock::new(at(7, 0, 0));
    let mut scheduler = Scheduler::new(JsonAlarmStore::new(&path), clock, &Config::default());
    let (tx, rx) = mpsc::channel();

    let due = scheduler.tick(&tx).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].label, "Coffee");
    assert!(matches!(
        &drain(&rx)[0].kind,
        MessageType::AlarmTriggered { label, .. } if label == "Coffee"
    ));
}

#[test]
fn retiring_one_shot_alarms_is_opt_in() {
    let one_shot = alarm_at(7, 0);
    let mut weekly = alarm_at(7, 0);
    weekly.repeat_days = RepeatDays::new([1]).unwrap();

    for retire in [false, true] {
        let store = MemoryAlarmStore::with_alarms(vec![one_shot.clone(), weekly.clone()]);
        let config = Config {
            retire_one_shot: retire,
            ..Config::default()
        };
        let mut scheduler = Scheduler::new(store.clone(), ManualClock::new(at(7, 0, 0)), &config);
        let (tx, _rx) = mpsc::channel();
        scheduler.tick(&tx).unwrap();
        scheduler.handle(Command::Dismiss, &tx).unwrap();
        scheduler.handle(Command::Dismiss, &tx).unwrap();

        let alarms = store.snapshot().unwrap();
        assert_eq!(alarms[0].enabled, !retire, "retire = {retire}");
        assert!(alarms[1].enabled);
    }
}

#[test]
fn commands_without_a_session_are_ignored() {
    let store = MemoryAlarmStore::new();
    let mut scheduler = Scheduler::new(store, ManualClock::new(at(7, 0, 0)), &Config::default());
    let (tx, rx) = mpsc::channel();
    assert_eq!(
        scheduler.handle(Command::Dismiss, &tx).unwrap(),
        ControlFlow::Continue(())
    );
    assert_eq!(
        scheduler.handle(Command::Snooze, &tx).unwrap(),
        ControlFlow::Continue(())
    );
    assert_eq!(
        scheduler.handle(Command::Shutdown, &tx).unwrap(),
        ControlFlow::Break(())
    );
    assert!(drain(&rx).is_empty());
}

#[test]
fn run_stops_on_shutdown_and_silences_the_ringing_alarm() {
    let alarm = alarm_at(7, 0);
    let store = MemoryAlarmStore::with_alarms(vec![alarm.clone()]);
    let mut scheduler = Scheduler::new(store, ManualClock::new(at(7, 0, 0)), &fast_config());
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    command_tx.send(Command::Shutdown).unwrap();

    scheduler.run(&command_rx, &event_tx).unwrap();
    assert_eq!(
        drain(&event_rx),
        vec![
            Message::triggered(&alarm),
            Message::stopped(&alarm, StopOutcome::Shutdown),
        ]
    );
    assert_eq!(scheduler.engine().state(), SessionState::Ringing);
}

#[test]
fn run_stops_when_commands_hang_up() {
    let mut scheduler = Scheduler::new(
        MemoryAlarmStore::new(),
        ManualClock::new(at(7, 0, 0)),
        &fast_config(),
    );
    let (command_tx, command_rx) = mpsc::channel::<Command>();
    let (event_tx, _event_rx) = mpsc::channel();
    drop(command_tx);
    assert!(scheduler.run(&command_rx, &event_tx).is_ok());
}

#[test]
fn clock_failure_ends_the_loop() {
    let clock = ManualClock::new(at(7, 0, 0));
    clock.break_down();
    let mut scheduler = Scheduler::new(MemoryAlarmStore::new(), clock, &fast_config());
    let (_command_tx, command_rx) = mpsc::channel::<Command>();
    let (event_tx, event_rx) = mpsc::channel();
    assert!(matches!(
        scheduler.run(&command_rx, &event_tx),
        Err(RunError::Clock(_))
    ));
    assert!(drain(&event_rx).is_empty());
}
