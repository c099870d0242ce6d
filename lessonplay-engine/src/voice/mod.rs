//! Voice Synthesis Adapter
//!
//! Wraps a remote text-to-speech engine with the platform's built-in speech
//! engine as fallback. Callers get a [`Narration`] whose completion fires
//! exactly once, whichever engine ended up speaking.
//!
//! Only one narration is ever active: starting a new one, or [`VoiceAdapter::stop`],
//! unconditionally cancels the remote audio source and the fallback engine.

mod clip;
mod remote;
mod simulated;

pub use clip::{AudioClip, AudioFormat};
pub use remote::HttpSynthesizer;
pub use simulated::{SimulatedAudioOutput, SimulatedSpeechEngine};

use crate::error::{Error, Result};
use async_trait::async_trait;
use lessonplay_common::config::VoiceConfig;
use lessonplay_common::events::{EventBus, LessonEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How a narration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// Spoke to the end
    Finished,
    /// Stopped, superseded or its engine went away
    Cancelled,
    /// Both the remote and the built-in engine failed
    Failed,
}

/// Engine that produced a narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEngine {
    Remote,
    Fallback,
}

/// Fixed voice parameters of the built-in engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self { rate: 0.9, pitch: 1.0 }
    }
}

impl From<&VoiceConfig> for SpeechParams {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            rate: config.fallback_rate,
            pitch: config.fallback_pitch,
        }
    }
}

/// Remote text-to-speech engine
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Return the raw audio body for `text`
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Audio output channel playing remote clips
pub trait AudioOutput: Send + Sync {
    /// Start playing; the receiver fires once when the clip ends or is cancelled
    fn play(
        &self,
        clip: AudioClip,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<NarrationOutcome>>;

    /// Halt whatever is playing
    fn stop(&self);
}

/// Platform built-in speech engine used as fallback
pub trait SpeechEngine: Send + Sync {
    /// Start speaking; the receiver fires once when speech ends or is cancelled
    fn speak(
        &self,
        text: &str,
        params: SpeechParams,
        cancel: CancellationToken,
    ) -> Result<oneshot::Receiver<NarrationOutcome>>;

    /// Halt whatever is being spoken
    fn cancel(&self);
}

/// Result of [`VoiceAdapter::synthesize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioHandle {
    /// Remote audio ready for the output channel
    Clip(AudioClip),
    /// Remote path failed; the built-in engine will speak this text
    Builtin(String),
}

impl AudioHandle {
    pub fn engine(&self) -> VoiceEngine {
        match self {
            Self::Clip(_) => VoiceEngine::Remote,
            Self::Builtin(_) => VoiceEngine::Fallback,
        }
    }
}

/// A running narration
#[derive(Debug)]
pub struct Narration {
    pub item_id: String,
    pub engine: VoiceEngine,
    done: oneshot::Receiver<NarrationOutcome>,
}

impl Narration {
    pub fn new(
        item_id: impl Into<String>,
        engine: VoiceEngine,
        done: oneshot::Receiver<NarrationOutcome>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            engine,
            done,
        }
    }

    /// Narration that was cancelled before it could start
    fn cancelled(item_id: &str, engine: VoiceEngine) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(NarrationOutcome::Cancelled);
        Self::new(item_id, engine, rx)
    }

    /// Wait for the completion signal
    ///
    /// A dropped sender counts as cancellation.
    pub async fn finished(self) -> NarrationOutcome {
        self.done.await.unwrap_or(NarrationOutcome::Cancelled)
    }
}

/// Voice Synthesis Adapter
pub struct VoiceAdapter {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    output: Arc<dyn AudioOutput>,
    fallback: Arc<dyn SpeechEngine>,
    params: SpeechParams,
    events: EventBus,
    /// Item id -> anchor element to scroll into view
    anchors: Mutex<HashMap<String, String>>,
    /// Token of the active narration
    current: Mutex<Option<CancellationToken>>,
}

impl VoiceAdapter {
    /// Create an adapter; `synthesizer = None` speaks everything with the fallback engine
    pub fn new(
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        output: Arc<dyn AudioOutput>,
        fallback: Arc<dyn SpeechEngine>,
        params: SpeechParams,
        events: EventBus,
    ) -> Self {
        Self {
            synthesizer,
            output,
            fallback,
            params,
            events,
            anchors: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
        }
    }

    /// Register the UI anchor element of an item
    pub fn register_anchor(&self, item_id: impl Into<String>, anchor: impl Into<String>) {
        self.anchors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item_id.into(), anchor.into());
    }

    /// Produce an audio handle for `text`
    ///
    /// Any failure of the remote path (network, status, empty or undecodable
    /// body) degrades to [`AudioHandle::Builtin`]. Blank text yields `None`.
    pub async fn synthesize(&self, text: &str) -> Option<AudioHandle> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let Some(synthesizer) = &self.synthesizer else {
            return Some(AudioHandle::Builtin(text.to_string()));
        };

        let clip = match synthesizer.synthesize(text).await {
            Ok(bytes) => AudioClip::decode(bytes),
            Err(e) => Err(e),
        };

        match clip {
            Ok(clip) => Some(AudioHandle::Clip(clip)),
            Err(e) => {
                warn!(error = %e, "Remote synthesis failed, using built-in speech engine");
                Some(AudioHandle::Builtin(text.to_string()))
            }
        }
    }

    /// Play a handle for `item_id` under the caller's cancellation token
    ///
    /// Replaces (and cancels) any active narration. If `cancel` already fired
    /// nothing starts. If the output rejects a remote clip the text is handed
    /// to the fallback engine. Fails only when the fallback engine fails too.
    pub fn play(
        &self,
        handle: AudioHandle,
        item_id: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<Narration> {
        // Held while starting so a concurrent stop() either precedes or follows the start
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if cancel.is_cancelled() {
            debug!(item_id, "Narration cancelled before playback");
            return Ok(Narration::cancelled(item_id, handle.engine()));
        }

        if let Some(previous) = current.replace(cancel.clone()) {
            previous.cancel();
            self.output.stop();
            self.fallback.cancel();
        }
        self.request_highlight(item_id);

        match handle {
            AudioHandle::Clip(clip) => match self.output.play(clip, cancel.clone()) {
                Ok(done) => {
                    debug!(item_id, "Narrating with remote engine");
                    Ok(Narration::new(item_id, VoiceEngine::Remote, done))
                }
                Err(e) => {
                    warn!(item_id, error = %e, "Audio output failed, using built-in speech engine");
                    self.speak_builtin(text, item_id, cancel)
                }
            },
            AudioHandle::Builtin(text) => self.speak_builtin(&text, item_id, cancel),
        }
    }

    /// Synthesize and play in one step
    ///
    /// Returns `Ok(None)` for blank text: nothing is spoken and the caller
    /// decides how to continue. A remote request still in flight when
    /// `cancel` fires is abandoned and the narration reports cancellation.
    pub async fn speak(
        &self,
        item_id: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Narration>> {
        let synthesized = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(item_id, "Narration cancelled during synthesis");
                return Ok(Some(Narration::cancelled(item_id, VoiceEngine::Remote)));
            }
            handle = self.synthesize(text) => handle,
        };
        let Some(handle) = synthesized else {
            debug!(item_id, "Skipping narration of blank text");
            return Ok(None);
        };
        self.play(handle, item_id, text, cancel).map(Some)
    }

    /// Stop both engines unconditionally
    pub fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.take() {
            token.cancel();
        }
        self.output.stop();
        self.fallback.cancel();
    }

    fn speak_builtin(&self, text: &str, item_id: &str, token: CancellationToken) -> Result<Narration> {
        match self.fallback.speak(text, self.params, token) {
            Ok(done) => {
                debug!(item_id, "Narrating with built-in speech engine");
                Ok(Narration::new(item_id, VoiceEngine::Fallback, done))
            }
            Err(e) => {
                error!(item_id, error = %e, "Built-in speech engine failed");
                Err(Error::FallbackSpeech(e.to_string()))
            }
        }
    }

    fn request_highlight(&self, item_id: &str) {
        let scroll_to = self
            .anchors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item_id)
            .cloned();
        self.events.emit_lossy(LessonEvent::HighlightRequested {
            item_id: item_id.to_string(),
            scroll_to,
        });
    }
}
