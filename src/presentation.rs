//! Terminal front end for ringing alarms.
//!
//! [`RingingPrompt`] turns scheduler messages into text and typed lines
//! into scheduler commands. It is also where the math challenge gates
//! dismissal: the engine dismisses whatever it is told to, so an alarm
//! with a challenge only gets a [`Command::Dismiss`] once the problem is
//! solved.

use std::{
    io::{self, BufRead, Write},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread,
    time::Duration,
};

use log::debug;
use rand::Rng;

use crate::{
    alarm::{AlarmId, AlarmTime},
    challenge::MathChallenge,
    communication::{Command, Message, MessageType, StopOutcome},
    tone::AlarmOutput,
};

#[derive(Debug)]
struct Ringing {
    alarm_id: AlarmId,
    challenge: Option<MathChallenge>,
    // a command went out, wait for the scheduler before sending another
    awaiting_scheduler: bool,
}

/// What to print and what to tell the scheduler after a line of input.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub command: Option<Command>,
    pub lines: Vec<String>,
}

impl Response {
    fn say(line: impl Into<String>) -> Self {
        Self {
            command: None,
            lines: vec![line.into()],
        }
    }

    fn send(command: Command) -> Self {
        Self {
            command: Some(command),
            lines: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct RingingPrompt<R> {
    rng: R,
    ringing: Option<Ringing>,
}

impl<R: Rng> RingingPrompt<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng, ringing: None }
    }

    /// The problem currently standing between the user and silence.
    pub fn challenge(&self) -> Option<&MathChallenge> {
        self.ringing.as_ref()?.challenge.as_ref()
    }

    pub const fn is_ringing(&self) -> bool {
        self.ringing.is_some()
    }

    pub fn on_message(&mut self, message: &Message) -> Vec<String> {
        match &message.kind {
            MessageType::AlarmTriggered {
                label,
                time,
                math_challenge,
                ..
            } => {
                let challenge = math_challenge.then(|| MathChallenge::generate(&mut self.rng));
                let mut lines = vec![format!("⏰ {time}  {label}")];
                match &challenge {
                    Some(challenge) => lines.push(format!(
                        "solve to dismiss: {challenge} = ?   (s to snooze)"
                    )),
                    None => lines.push("d to dismiss, s to snooze".to_string()),
                }
                self.ringing = Some(Ringing {
                    alarm_id: message.alarm_id.clone(),
                    challenge,
                    awaiting_scheduler: false,
                });
                lines
            }
            MessageType::AlarmQueued { label, time } => {
                vec![format!("{time}  {label} is due as well, it rings next")]
            }
            MessageType::AlarmStopped(outcome) => {
                if self
                    .ringing
                    .as_ref()
                    .is_some_and(|ringing| ringing.alarm_id == message.alarm_id)
                {
                    self.ringing = None;
                }
                match outcome {
                    StopOutcome::Dismissed => vec!["Good morning! Have a great day!".to_string()],
                    StopOutcome::Snoozed { until } => vec![snoozed_line(*until)],
                    StopOutcome::Shutdown => Vec::new(),
                }
            }
        }
    }

    pub fn on_input(&mut self, line: &str) -> Response {
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            return Response::send(Command::Shutdown);
        }
        let Some(ringing) = &mut self.ringing else {
            if input.is_empty() {
                return Response::default();
            }
            return Response::say("nothing is ringing (q quits)");
        };
        if ringing.awaiting_scheduler {
            return Response::default();
        }
        if input.eq_ignore_ascii_case("s") {
            ringing.awaiting_scheduler = true;
            return Response::send(Command::Snooze);
        }
        match &ringing.challenge {
            Some(challenge) if challenge.check(input) => {
                ringing.awaiting_scheduler = true;
                Response::send(Command::Dismiss)
            }
            Some(challenge) if input.eq_ignore_ascii_case("d") => {
                Response::say(format!("solve {challenge} first"))
            }
            Some(_) => {
                let next = MathChallenge::generate(&mut self.rng);
                ringing.challenge = Some(next);
                Response::say(format!("wrong, try {next} = ?"))
            }
            None if input.is_empty() || input.eq_ignore_ascii_case("d") => {
                ringing.awaiting_scheduler = true;
                Response::send(Command::Dismiss)
            }
            None => Response::say("d to dismiss, s to snooze"),
        }
    }
}

fn snoozed_line(until: AlarmTime) -> String {
    format!("alarm snoozed until {until}")
}

/// Forwards stdin lines until end of input.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin closed");
    });
    rx
}

/// Shows scheduler messages, plays them through `output` and turns user
/// input into commands. Returns once the scheduler hangs up.
pub fn run_terminal<R: Rng, O: AlarmOutput>(
    prompt: &mut RingingPrompt<R>,
    output: &mut O,
    events: &Receiver<Message>,
    lines: &Receiver<String>,
    commands: &Sender<Command>,
) {
    let mut stdout = io::stdout();
    let mut print = |lines: &[String]| {
        for line in lines {
            // the terminal going away is not worth stopping an alarm for
            let _ = writeln!(stdout, "{line}");
        }
        let _ = stdout.flush();
    };
    let mut stdin_open = true;
    loop {
        match events.recv_timeout(Duration::from_millis(50)) {
            Ok(message) => {
                output.handle(&message);
                print(&prompt.on_message(&message));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        while stdin_open {
            match lines.try_recv() {
                Ok(line) => {
                    let response = prompt.on_input(&line);
                    print(&response.lines);
                    if let Some(command) = response.command {
                        let _ = commands.send(command);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // keep ringing and polling, a detached daemon has no stdin
                    debug!("no more input, alarms can no longer be dismissed here");
                    stdin_open = false;
                }
            }
        }
    }
    output.stop_all();
}
