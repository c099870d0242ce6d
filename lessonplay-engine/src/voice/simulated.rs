//! Timer-driven audio output and speech engine
//!
//! Stand-ins for platform audio used by the command-line runner: they
//! "play" for the estimated duration of the clip or text and honour
//! cancellation exactly like a real device would.

use super::{AudioClip, AudioOutput, NarrationOutcome, SpeechEngine, SpeechParams};
use crate::error::Result;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Speaking speed of the built-in engine at rate 1.0
const WORDS_PER_MINUTE: f64 = 160.0;

/// Shortest utterance
const MIN_UTTERANCE: Duration = Duration::from_millis(300);

/// Estimated time to speak `text` at `rate`
pub fn estimate_speech_duration(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count() as f64;
    let rate = f64::from(rate.max(0.1));
    let secs = words / (WORDS_PER_MINUTE * rate) * 60.0;
    Duration::from_secs_f64(secs).max(MIN_UTTERANCE)
}

/// Sleep for `duration` unless cancelled, then report once
fn spawn_timer(
    duration: Duration,
    cancel: CancellationToken,
) -> oneshot::Receiver<NarrationOutcome> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = tokio::select! {
            _ = tokio::time::sleep(duration) => NarrationOutcome::Finished,
            _ = cancel.cancelled() => NarrationOutcome::Cancelled,
        };
        let _ = tx.send(outcome);
    });
    rx
}

/// Holds the token of whatever is currently sounding
#[derive(Default)]
struct Channel {
    active: Mutex<Option<CancellationToken>>,
}

impl Channel {
    fn start(&self, cancel: CancellationToken) -> CancellationToken {
        let local = cancel.child_token();
        if let Some(previous) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(local.clone())
        {
            previous.cancel();
        }
        local
    }

    fn halt(&self) {
        if let Some(active) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            active.cancel();
        }
    }
}

/// Audio output that waits out the clip duration
pub struct SimulatedAudioOutput {
    time_scale: f64,
    channel: Channel,
}

impl SimulatedAudioOutput {
    /// `time_scale` multiplies every clip duration (1.0 = real time)
    pub fn new(time_scale: f64) -> Self {
        Self {
            time_scale: time_scale.max(0.0),
            channel: Channel::default(),
        }
    }
}

impl AudioOutput for SimulatedAudioOutput {
    fn play(
        &self,
        clip: AudioClip,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<NarrationOutcome>> {
        let local = self.channel.start(cancel);
        Ok(spawn_timer(clip.duration.mul_f64(self.time_scale), local))
    }

    fn stop(&self) {
        self.channel.halt();
    }
}

/// Built-in speech engine that waits out the estimated speaking time
pub struct SimulatedSpeechEngine {
    time_scale: f64,
    channel: Channel,
}

impl SimulatedSpeechEngine {
    pub fn new(time_scale: f64) -> Self {
        Self {
            time_scale: time_scale.max(0.0),
            channel: Channel::default(),
        }
    }
}

impl SpeechEngine for SimulatedSpeechEngine {
    fn speak(
        &self,
        text: &str,
        params: SpeechParams,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<NarrationOutcome>> {
        tracing::info!(rate = params.rate, pitch = params.pitch, "Speaking: {}", text);
        let local = self.channel.start(cancel);
        let duration = estimate_speech_duration(text, params.rate).mul_f64(self.time_scale);
        Ok(spawn_timer(duration, local))
    }

    fn cancel(&self) {
        self.channel.halt();
    }
}
