//! Sound and vibration for ringing alarms.
//!
//! The ringtone is synthesized, there are no sound files to ship: a square
//! wave pulsing every 800 ms, each pulse at a slightly different pitch so
//! it is hard to tune out.

use std::{io::Write, thread, time::Duration};

use log::{info, warn};
use rand::Rng;
use rodio::{
    source::{self, SquareWave},
    OutputStream, OutputStreamBuilder, Sink, Source,
};

use crate::{
    alarm::AlarmId,
    communication::{Message, MessageType},
    error::ToneError,
};

const BASE_FREQUENCY: f32 = 440.0;
const PULSE: Duration = Duration::from_millis(800);
const ATTACK: Duration = Duration::from_millis(50);
const PEAK_GAIN: f32 = 0.6;
// on/off pattern in milliseconds
const VIBRATION_PATTERN: [u64; 5] = [500, 200, 500, 200, 500];

/// Anything that can make an alarm noticeable.
pub trait AlarmOutput {
    fn start(&mut self, alarm_id: &AlarmId, vibration: bool);
    fn stop(&mut self, alarm_id: &AlarmId);
    fn stop_all(&mut self);

    fn handle(&mut self, message: &Message) {
        match &message.kind {
            MessageType::AlarmTriggered { vibration, .. } => {
                self.start(&message.alarm_id, *vibration);
            }
            MessageType::AlarmQueued { .. } => {}
            MessageType::AlarmStopped(_) => self.stop(&message.alarm_id),
        }
    }
}

fn pulse(frequency: f32) -> impl Source<Item = f32> + Send {
    SquareWave::new(frequency)
        .take_duration(PULSE)
        .fade_in(ATTACK)
        .amplify(PEAK_GAIN)
}

fn open_stream() -> Result<OutputStream, ToneError> {
    let mut stream =
        OutputStreamBuilder::open_default_stream().map_err(|e| ToneError(e.to_string()))?;
    stream.log_on_drop(false);
    Ok(stream)
}

/// Rings the terminal bell in the vibration pattern, off the calling thread.
fn vibrate() {
    thread::spawn(|| {
        let mut stdout = std::io::stdout();
        for (i, millis) in VIBRATION_PATTERN.iter().enumerate() {
            if i % 2 == 0 {
                let _ = stdout.write_all(b"\x07");
                let _ = stdout.flush();
            }
            thread::sleep(Duration::from_millis(*millis));
        }
    });
}

/// Plays the pulsing ringtone on the default audio device.
/// Without a device it logs once and stays silent.
pub struct ToneOutput {
    stream: Option<OutputStream>,
    playing: Option<(AlarmId, Sink)>,
    volume: f32,
}

impl ToneOutput {
    /// `volume` is 0 to 100.
    #[must_use]
    pub fn new(volume: f32) -> Self {
        let stream = match open_stream() {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("alarms will be silent: {e}");
                None
            }
        };
        Self {
            stream,
            playing: None,
            volume,
        }
    }

    /// Plays a single tone so the user can check their volume.
    pub fn play_test_tone(volume: f32, duration: Duration) -> Result<(), ToneError> {
        let stream = open_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(volume / 100.0);
        sink.append(
            SquareWave::new(BASE_FREQUENCY)
                .take_duration(duration)
                .fade_in(Duration::from_millis(20))
                .amplify(PEAK_GAIN),
        );
        sink.sleep_until_end();
        Ok(())
    }
}

impl AlarmOutput for ToneOutput {
    fn start(&mut self, alarm_id: &AlarmId, vibration: bool) {
        if vibration {
            vibrate();
        }
        if self
            .playing
            .as_ref()
            .is_some_and(|(playing, _)| playing == alarm_id)
        {
            return;
        }
        self.stop_all();
        let Some(stream) = &self.stream else {
            return;
        };
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.volume / 100.0);
        // an endless run of pulses, stopped by dropping the sink
        sink.append(source::from_iter(std::iter::repeat_with(|| {
            pulse(BASE_FREQUENCY + rand::thread_rng().gen_range(0.0..220.0))
        })));
        sink.play();
        info!("ringing for alarm {alarm_id}");
        self.playing = Some((alarm_id.clone(), sink));
    }

    fn stop(&mut self, alarm_id: &AlarmId) {
        if self
            .playing
            .as_ref()
            .is_some_and(|(playing, _)| playing == alarm_id)
        {
            self.stop_all();
        }
    }

    fn stop_all(&mut self) {
        if let Some((alarm_id, sink)) = self.playing.take() {
            sink.stop();
            info!("stopped ringing for alarm {alarm_id}");
        }
    }
}
