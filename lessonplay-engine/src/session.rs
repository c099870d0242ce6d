//! Lesson session
//!
//! Wires the voice adapter, media resolver, persistence bridge and playback
//! controller for one open lesson. Opening a session consults the media store
//! before anything else runs, then starts three background tasks:
//! - the reconciliation tick of the bridge
//! - the event-bus listener serving display requests
//! - the completion pump feeding narration completions to the controller
//!
//! [`LessonSession::close`] cancels all three and releases the display slot.

use crate::error::{Error, Result};
use crate::media::{DisplayOutcome, MediaBridge, MediaPanel, MediaResolver};
use crate::playback::{CompletionReceiver, PlaybackController};
use crate::voice::{
    AudioOutput, HttpSynthesizer, SimulatedAudioOutput, SimulatedSpeechEngine, SpeechEngine,
    SpeechParams, SpeechSynthesizer, VoiceAdapter,
};
use lessonplay_common::config::{PlayerConfig, VoiceConfig};
use lessonplay_common::db::init_database;
use lessonplay_common::events::{EventBus, LessonEvent, PlaybackState};
use lessonplay_common::lesson::Lesson;
use lessonplay_common::media::{DisplayRequest, MediaDescriptor};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engines behind the voice adapter
pub struct VoiceBackends {
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub output: Arc<dyn AudioOutput>,
    pub fallback: Arc<dyn SpeechEngine>,
}

impl VoiceBackends {
    /// Remote engine from `config` (when an endpoint is set) with simulated
    /// audio output and fallback speech
    pub fn simulated(config: &VoiceConfig, time_scale: f64) -> Result<Self> {
        let synthesizer = HttpSynthesizer::from_config(config)?
            .map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>);
        if synthesizer.is_none() {
            info!("No remote voice endpoint configured, using built-in speech engine");
        }
        Ok(Self {
            synthesizer,
            output: Arc::new(SimulatedAudioOutput::new(time_scale)),
            fallback: Arc::new(SimulatedSpeechEngine::new(time_scale)),
        })
    }
}

/// One open lesson
pub struct LessonSession {
    lesson: Arc<Lesson>,
    events: EventBus,
    voice: Arc<VoiceAdapter>,
    resolver: Arc<MediaResolver>,
    bridge: Arc<MediaBridge>,
    controller: Arc<Mutex<PlaybackController>>,
    cancel: CancellationToken,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl LessonSession {
    /// Open `lesson` with explicit backends and store
    ///
    /// `store = None` runs the bridge in degraded mode.
    pub async fn open(
        lesson: Lesson,
        backends: VoiceBackends,
        store: Option<SqlitePool>,
        config: &PlayerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let lesson = Arc::new(lesson);
        let events = EventBus::new(config.sync.event_bus_capacity);
        let resolver = Arc::new(MediaResolver::from_config(&config.media));
        let bridge = Arc::new(MediaBridge::new(store, Arc::clone(&resolver), events.clone()));
        let voice = Arc::new(VoiceAdapter::new(
            backends.synthesizer,
            backends.output,
            backends.fallback,
            SpeechParams::from(&config.voice),
            events.clone(),
        ));

        info!(lesson_id = lesson.lesson_id(), "Opening lesson session");

        // Stored pin wins over any ambient resolution
        if bridge.restore_on_mount().await.is_none() {
            debug!("No pinned media to restore");
        }

        let (controller, completions) = PlaybackController::new(
            Arc::clone(&lesson),
            Arc::clone(&voice),
            Arc::clone(&resolver),
            Arc::clone(&bridge),
            events.clone(),
        );
        let controller = Arc::new(Mutex::new(controller));

        bridge.start_reconciler(Duration::from_millis(config.sync.reconcile_interval_ms));

        let cancel = CancellationToken::new();
        let listener = spawn_event_listener(
            events.subscribe(),
            Arc::clone(&lesson),
            Arc::clone(&resolver),
            Arc::clone(&bridge),
            cancel.clone(),
        );
        let pump = spawn_completion_pump(completions, Arc::clone(&controller), cancel.clone());

        Ok(Self {
            lesson,
            events,
            voice,
            resolver,
            bridge,
            controller,
            cancel,
            tasks: std::sync::Mutex::new(vec![listener, pump]),
            closed: AtomicBool::new(false),
        })
    }

    /// Open `lesson` with engines and store built from `config`
    ///
    /// A store that cannot be opened degrades persistence instead of failing.
    pub async fn from_config(lesson: Lesson, config: &PlayerConfig, time_scale: f64) -> Result<Self> {
        let backends = VoiceBackends::simulated(&config.voice, time_scale)?;
        let store = match init_database(&config.database_path).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(
                    path = %config.database_path.display(),
                    error = %e,
                    "Failed to open media store, continuing without persistence"
                );
                None
            }
        };
        Self::open(lesson, backends, store, config).await
    }

    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LessonEvent> {
        self.events.subscribe()
    }

    pub fn bridge(&self) -> &Arc<MediaBridge> {
        &self.bridge
    }

    pub fn voice(&self) -> &Arc<VoiceAdapter> {
        &self.voice
    }

    /// Snapshot of the playback state
    pub async fn state(&self) -> PlaybackState {
        self.controller.lock().await.snapshot()
    }

    /// Snapshot of the media panel
    pub async fn media(&self) -> MediaPanel {
        self.bridge.panel().await
    }

    pub async fn toggle_playback(&self) -> Result<()> {
        self.ensure_open()?;
        self.controller.lock().await.toggle_playback().await
    }

    pub async fn play_from(&self, item_id: &str) -> Result<()> {
        self.ensure_open()?;
        self.controller.lock().await.play_from(item_id).await
    }

    pub async fn mute(&self) {
        self.controller.lock().await.mute();
    }

    pub async fn unmute(&self) {
        self.controller.lock().await.unmute().await;
    }

    /// Select a question (or `None` for the whole lesson)
    ///
    /// While idle, a pin stored for the question is shown over its ambient media.
    pub async fn select_question(&self, question_id: Option<&str>) -> Result<()> {
        self.ensure_open()?;
        let mut controller = self.controller.lock().await;
        controller.select_question(question_id).await?;
        if let Some(id) = question_id {
            if !controller.state().is_playing {
                self.bridge.restore_for_source(id).await;
            }
        }
        Ok(())
    }

    /// Pin the resolved media of a question or exercise
    pub async fn mark_permanent(&self, source_id: &str) -> Result<DisplayOutcome> {
        let descriptor = self
            .resolver
            .resolve_source(&self.lesson, source_id)
            .ok_or_else(|| Error::NotFound(format!("media source {}", source_id)))?;
        Ok(self.bridge.mark_permanent(descriptor).await)
    }

    /// Display request from outside the controller
    pub async fn request_display(&self, request: &DisplayRequest) -> DisplayOutcome {
        let descriptor = self.resolver.from_request(request);
        self.bridge.request_display(descriptor).await
    }

    pub async fn clear_permanent(&self, source_id: &str) {
        self.bridge.clear_permanent(source_id).await;
    }

    pub async fn report_render_failure(&self, url: &str) -> Option<MediaDescriptor> {
        self.bridge.report_render_failure(url).await
    }

    /// Register the scroll anchor of a queue item
    pub fn register_anchor(&self, item_id: &str, anchor: &str) {
        self.voice.register_anchor(item_id, anchor);
    }

    /// Stop audio, background tasks and the display slot; idempotent
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(lesson_id = self.lesson.lesson_id(), "Closing lesson session");

        self.cancel.cancel();
        self.controller.lock().await.close();
        self.bridge.shutdown().await;

        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }

        self.bridge.release().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Playback("session is closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for LessonSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.voice.stop();
    }
}

/// Serve display requests published on the event bus
fn spawn_event_listener(
    mut rx: broadcast::Receiver<LessonEvent>,
    lesson: Arc<Lesson>,
    resolver: Arc<MediaResolver>,
    bridge: Arc<MediaBridge>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => event,
            };

            match event {
                Ok(LessonEvent::DisplayRequested { request }) => {
                    let descriptor = resolver.from_request(&request);
                    bridge.request_display(descriptor).await;
                }
                Ok(LessonEvent::FallbackMediaRequested { source_id }) => {
                    let descriptor = resolver
                        .resolve_source(&lesson, &source_id)
                        .unwrap_or_else(|| resolver.placeholder(&source_id));
                    bridge.request_display(descriptor).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Event listener stopped");
    })
}

/// Feed narration completions to the controller
fn spawn_completion_pump(
    mut completions: CompletionReceiver,
    controller: Arc<Mutex<PlaybackController>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let completion = tokio::select! {
                _ = cancel.cancelled() => break,
                completion = completions.recv() => completion,
            };
            let Some(completion) = completion else {
                break;
            };
            controller.lock().await.on_completion(completion).await;
        }
        debug!("Completion pump stopped");
    })
}
