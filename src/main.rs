use std::{error::Error, num::NonZeroU32, sync::mpsc, thread, time::Duration};

use clap::{Parser, Subcommand};
use wakewise::{
    alarm::{has_duplicate_time, next_alarm, Alarm, AlarmBuilder, AlarmId, AlarmTime, RepeatDays},
    clock::{Clock, SystemClock},
    config::Config,
    error::AlarmError,
    presentation::{run_terminal, spawn_stdin_reader, RingingPrompt},
    scheduler::Scheduler,
    store::{AlarmStore, JsonAlarmStore},
    tone::ToneOutput,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config file
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// add an alarm, TIME is HH:MM (24h)
    Add {
        time: AlarmTime,
        #[clap(long, short)]
        label: Option<String>,
        /// weekdays to ring on, 0 = Sunday .. 6 = Saturday, default every day
        #[clap(long, short, value_delimiter = ',')]
        days: Vec<u8>,
        #[clap(long, short)]
        snooze: Option<NonZeroU32>,
        #[clap(long)]
        no_vibration: bool,
        /// require solving a math problem to dismiss
        #[clap(long, short)]
        math: bool,
    },
    List,
    Remove {
        id: String,
    },
    /// enable or disable an alarm
    Toggle {
        id: String,
    },
    /// show the alarm that rings next
    Next,
    /// watch the clock and ring alarms (the default)
    Run,
    TestTone,
}

fn describe(alarm: &Alarm, time_format: &str) -> String {
    let mut flags = Vec::new();
    if alarm.vibration {
        flags.push("vibrate");
    }
    if alarm.math_challenge {
        flags.push("math");
    }
    format!(
        "{}  {}  {}  {:<12} {} [snooze {}m{}{}]",
        alarm.id,
        alarm.time.to_naive_time().format(time_format),
        if alarm.enabled { "on " } else { "off" },
        alarm.repeat_days.to_string(),
        alarm.display_label(),
        alarm.snooze_minutes,
        if flags.is_empty() { "" } else { ", " },
        flags.join(", "),
    )
}

fn run(config: &Config, store: JsonAlarmStore) -> Result<(), Box<dyn Error>> {
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    let lines = spawn_stdin_reader();
    let volume = config.volume;
    let terminal = thread::spawn(move || {
        let mut output = ToneOutput::new(volume);
        let mut prompt = RingingPrompt::new(rand::thread_rng());
        run_terminal(&mut prompt, &mut output, &event_rx, &lines, &command_tx);
    });
    println!("watching {} alarms, q to quit", store.path().display());
    let mut scheduler = Scheduler::new(store, SystemClock, config);
    let result = scheduler.run(&command_rx, &event_tx);
    // hanging up lets the terminal thread finish and silence the tone
    drop(event_tx);
    if terminal.join().is_err() {
        log::error!("terminal thread panicked");
    }
    result.map_err(Into::into)
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("wakewise")?;

    let args = Args::parse();
    let config_path = Config::config_path()?;
    let config = Config::load(&config_path)?;
    let mut store = JsonAlarmStore::new(config.alarms_path()?);

    match args.command.unwrap_or(Command::Run) {
        Command::Init { force } => {
            if force || !Config::is_config_present() {
                Config::new().save(&config_path)?;
                println!("wrote {}", config_path.display());
            } else {
                println!(
                    "{} already exists, use --force to overwrite it",
                    config_path.display()
                );
            }
        }
        Command::Add {
            time,
            label,
            days,
            snooze,
            no_vibration,
            math,
        } => {
            if has_duplicate_time(&store.snapshot()?, time, None) {
                return Err(AlarmError::DuplicateTime(time.to_string()).into());
            }
            let alarm = AlarmBuilder::new(time)
                .label(label.unwrap_or_default())
                .repeat_days(RepeatDays::new(days)?)
                .snooze_minutes(snooze.unwrap_or(config.default_snooze_minutes))
                .vibration(!no_vibration)
                .math_challenge(math)
                .build();
            let alarm = store.insert(alarm)?;
            println!("{}", describe(&alarm, &config.time_format));
        }
        Command::List => {
            for alarm in store.snapshot()? {
                println!("{}", describe(&alarm, &config.time_format));
            }
        }
        Command::Remove { id } => {
            let removed = store.remove(&AlarmId::from(id))?;
            println!("removed {}", describe(&removed, &config.time_format));
        }
        Command::Toggle { id } => {
            let toggled = store.toggle(&AlarmId::from(id))?;
            println!("{}", describe(&toggled, &config.time_format));
        }
        Command::Next => {
            let now = SystemClock.now()?;
            let alarms = store.snapshot()?;
            match next_alarm(&alarms, now) {
                Some((alarm, at)) => {
                    let until = at - now;
                    println!(
                        "{} at {} (in {}h {}m)",
                        alarm.display_label(),
                        at.format("%a %Y-%m-%d %H:%M"),
                        until.num_hours(),
                        until.num_minutes() % 60
                    );
                }
                None => println!("no alarms enabled"),
            }
        }
        Command::Run => run(&config, store)?,
        Command::TestTone => ToneOutput::play_test_tone(config.volume, Duration::from_millis(1500))?,
    }
    Ok(())
}
