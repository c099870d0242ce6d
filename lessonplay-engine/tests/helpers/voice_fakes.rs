//! Scripted voice engines
//!
//! `ManualEngine` never finishes on its own: the test decides when the
//! current utterance ends with [`ManualEngine::finish_current`]. Cancellation
//! is honoured the way a device would honour it.

use async_trait::async_trait;
use lessonplay_engine::voice::{
    AudioClip, AudioOutput, NarrationOutcome, SpeechEngine, SpeechParams, SpeechSynthesizer,
};
use lessonplay_engine::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Half a second of 16 kHz mono PCM silence as a WAV body
pub fn wav_bytes() -> Vec<u8> {
    let sample_rate: u32 = 16_000;
    let data_len: u32 = sample_rate;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);
    bytes
}

/// Remote synthesizer that succeeds or fails on demand
#[derive(Default)]
pub struct ScriptedSynthesizer {
    fail: AtomicBool,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
    completed: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn working() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let synthesizer = Self::default();
        synthesizer.set_failing(true);
        synthesizer
    }

    /// Responds only after `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests that ran to a response
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Synthesis("scripted failure".to_string()));
        }
        Ok(wav_bytes())
    }
}

struct Pending {
    finish: oneshot::Sender<()>,
    cancel: CancellationToken,
}

/// Audio output and speech engine finished by the test
#[derive(Default)]
pub struct ManualEngine {
    fail: AtomicBool,
    started: Mutex<Vec<String>>,
    pending: Mutex<Vec<Pending>>,
    stops: AtomicUsize,
}

impl ManualEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let engine = Self::default();
        engine.fail.store(true, Ordering::SeqCst);
        engine
    }

    /// Texts started so far (`"<clip>"` for remote clips)
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn last_started(&self) -> Option<String> {
        self.started.lock().unwrap().last().cloned()
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Utterances started and neither finished nor cancelled
    pub fn active_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.cancel.is_cancelled())
            .count()
    }

    /// End the most recent live utterance; false when nothing is sounding
    pub fn finish_current(&self) -> bool {
        let mut pending = self.pending.lock().unwrap();
        pending.retain(|p| !p.cancel.is_cancelled());
        match pending.pop() {
            Some(p) => p.finish.send(()).is_ok(),
            None => false,
        }
    }

    /// Wait until `count` utterances have started
    pub async fn wait_for_starts(&self, count: usize) -> bool {
        super::eventually(move || async move { self.start_count() >= count }).await
    }

    /// Wait until an utterance is sounding
    pub async fn wait_for_active(&self) -> bool {
        super::eventually(move || async move { self.active_count() > 0 }).await
    }

    fn start(&self, label: String, cancel: CancellationToken) -> Result<oneshot::Receiver<NarrationOutcome>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("scripted engine failure".to_string()));
        }

        let (done_tx, done_rx) = oneshot::channel();
        let (finish_tx, finish_rx) = oneshot::channel();
        let token = cancel.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => NarrationOutcome::Cancelled,
                finished = finish_rx => match finished {
                    Ok(()) => NarrationOutcome::Finished,
                    Err(_) => NarrationOutcome::Cancelled,
                },
            };
            let _ = done_tx.send(outcome);
        });

        self.started.lock().unwrap().push(label);
        self.pending.lock().unwrap().push(Pending {
            finish: finish_tx,
            cancel,
        });
        Ok(done_rx)
    }

    fn halt(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        for pending in self.pending.lock().unwrap().drain(..) {
            pending.cancel.cancel();
        }
    }
}

impl AudioOutput for ManualEngine {
    fn play(
        &self,
        _clip: AudioClip,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<NarrationOutcome>> {
        self.start("<clip>".to_string(), cancel)
    }

    fn stop(&self) {
        self.halt();
    }
}

impl SpeechEngine for ManualEngine {
    fn speak(
        &self,
        text: &str,
        _params: SpeechParams,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<NarrationOutcome>> {
        self.start(text.to_string(), cancel)
    }

    fn cancel(&self) {
        self.halt();
    }
}
