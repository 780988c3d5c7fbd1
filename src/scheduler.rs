//! Drives the [`TriggerEngine`] from a clock and an alarm store.
//!
//! Ticks and user commands share one loop: the scheduler waits on the
//! command channel for at most the poll interval, and every time the
//! interval elapses it reads the clock, takes a snapshot of the enabled
//! alarms and polls the engine. Everything that happens is reported on an
//! outgoing [`Message`] channel.

use std::{
    ops::ControlFlow,
    sync::mpsc::{Receiver, RecvTimeoutError, Sender},
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::{
    alarm::Alarm,
    clock::Clock,
    communication::{Command, Message, StopOutcome},
    config::Config,
    engine::TriggerEngine,
    error::{ClockError, RunError},
    store::AlarmStore,
};

fn emit(events: &Sender<Message>, message: Message) {
    if events.send(message).is_err() {
        debug!("nobody is listening for alarm messages");
    }
}

#[derive(Debug)]
pub struct Scheduler<S, C> {
    engine: TriggerEngine,
    store: S,
    clock: C,
    poll_interval: Duration,
    retire_one_shot: bool,
    // snoozed alarms the store refused, retried every tick
    unsaved: Vec<Alarm>,
}

impl<S: AlarmStore, C: Clock> Scheduler<S, C> {
    #[must_use]
    pub fn new(store: S, clock: C, config: &Config) -> Self {
        Self {
            engine: TriggerEngine::new(),
            store,
            clock,
            poll_interval: config.poll_interval(),
            retire_one_shot: config.retire_one_shot,
            unsaved: Vec::new(),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Snoozed alarms that are still waiting to be written to the store.
    #[must_use]
    pub fn unsaved(&self) -> &[Alarm] {
        &self.unsaved
    }

    fn save_snoozed(&mut self, alarm: Alarm) {
        if let Err(e) = self.store.insert(alarm.clone()) {
            warn!(
                "couldn't save snoozed alarm {} for {}, trying again next tick: {e}",
                alarm.id, alarm.time
            );
            self.unsaved.push(alarm);
        }
    }

    /// One polling cycle. An unreadable store counts as having no alarms
    /// for this cycle; a failing clock is returned as an error.
    ///
    /// Snoozed alarms the store could not take are retried first, and
    /// take part in the poll even while the store is still refusing them.
    pub fn tick(&mut self, events: &Sender<Message>) -> Result<Vec<Alarm>, ClockError> {
        let now = self.clock.now()?;
        for alarm in std::mem::take(&mut self.unsaved) {
            self.save_snoozed(alarm);
        }
        let mut alarms = self.store.list_enabled_alarms().unwrap_or_else(|e| {
            warn!("couldn't read alarms, trying again next tick: {e}");
            Vec::new()
        });
        alarms.extend(self.unsaved.iter().cloned());
        let due = self.engine.poll(now, &alarms);
        if due.is_empty() {
            debug!("tick at {now}: nothing due");
        }
        for alarm in &due {
            if self.engine.ringing().is_some_and(|ringing| ringing.id == alarm.id) {
                emit(events, Message::triggered(alarm));
            } else {
                emit(events, Message::queued(alarm));
            }
        }
        Ok(due)
    }

    /// Applies a user command. Returns `Break` for [`Command::Shutdown`].
    pub fn handle(
        &mut self,
        command: Command,
        events: &Sender<Message>,
    ) -> Result<ControlFlow<()>, ClockError> {
        match command {
            Command::Dismiss => {
                let Some(alarm) = self.engine.dismiss() else {
                    debug!("dismiss with no alarm ringing");
                    return Ok(ControlFlow::Continue(()));
                };
                emit(events, Message::stopped(&alarm, StopOutcome::Dismissed));
                if self.retire_one_shot && alarm.is_one_shot() {
                    match self.store.set_enabled(&alarm.id, false) {
                        Ok(_) => info!("one-shot alarm {} disabled", alarm.id),
                        Err(e) => error!("couldn't disable one-shot alarm {}: {e}", alarm.id),
                    }
                }
                self.announce_ringing(events);
            }
            Command::Snooze => {
                let now = self.clock.now()?;
                let Some(snooze) = self.engine.snooze(now) else {
                    debug!("snooze with no alarm ringing");
                    return Ok(ControlFlow::Continue(()));
                };
                let until = snooze.replacement.time;
                self.save_snoozed(snooze.replacement);
                emit(
                    events,
                    Message::stopped(&snooze.original, StopOutcome::Snoozed { until }),
                );
                self.announce_ringing(events);
            }
            Command::Shutdown => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    // a queued alarm takes over once the previous session ends
    fn announce_ringing(&self, events: &Sender<Message>) {
        if let Some(next) = self.engine.ringing() {
            emit(events, Message::triggered(next));
        }
    }

    /// Runs until [`Command::Shutdown`] arrives, the command channel is
    /// closed, or the clock fails. A still ringing alarm is reported
    /// stopped on the way out.
    pub fn run(
        &mut self,
        commands: &Receiver<Command>,
        events: &Sender<Message>,
    ) -> Result<(), RunError> {
        info!("scheduler started, polling every {:?}", self.poll_interval);
        let result = self.run_loop(commands, events);
        if let Some(alarm) = self.engine.ringing() {
            emit(events, Message::stopped(alarm, StopOutcome::Shutdown));
        }
        match &result {
            Ok(()) => info!("scheduler stopped"),
            Err(e) => error!("scheduler stopped: {e}"),
        }
        result
    }

    fn run_loop(
        &mut self,
        commands: &Receiver<Command>,
        events: &Sender<Message>,
    ) -> Result<(), RunError> {
        self.tick(events)?;
        let mut last_tick = Instant::now();
        loop {
            let wait = self.poll_interval.saturating_sub(last_tick.elapsed());
            match commands.recv_timeout(wait) {
                Ok(command) => {
                    if self.handle(command, events)?.is_break() {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
            if last_tick.elapsed() >= self.poll_interval {
                self.tick(events)?;
                last_tick = Instant::now();
            }
        }
    }
}
