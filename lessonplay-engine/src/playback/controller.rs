//! Playback Controller
//!
//! Finite-state machine over [`PlaybackState`]:
//!
//! ```text
//! Idle ──toggle──▶ Playing(0)
//! Playing(i) ──completion──▶ Playing(i+1) | Finished(len)
//! Playing(i) ──toggle──▶ Paused(i)          (index kept)
//! Playing(i) ──mute──▶ Muted(i) ──unmute──▶ Playing(i)
//! ```
//!
//! Each narration runs under its own generation number and cancellation
//! token. Completions arrive on a channel and are applied with
//! [`PlaybackController::on_completion`]; a completion from an older
//! generation is stale and ignored, so a stopped or superseded narration can
//! never advance the queue.

use super::queue_builder::build_queue;
use crate::error::{Error, Result};
use crate::media::{MediaBridge, MediaResolver};
use crate::voice::{NarrationOutcome, VoiceAdapter};
use lessonplay_common::content::ContentQueue;
use lessonplay_common::events::{EventBus, LessonEvent, PlaybackState};
use lessonplay_common::lesson::Lesson;
use lessonplay_common::media::MediaDescriptor;
use lessonplay_common::time;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Completion signal of one narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub generation: u64,
    pub index: usize,
    pub outcome: NarrationOutcome,
}

/// Receiving end of the completion channel
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

/// Playback Controller
///
/// Exclusively owns the audio channel: nothing else starts or stops
/// narration.
pub struct PlaybackController {
    lesson: Arc<Lesson>,
    voice: Arc<VoiceAdapter>,
    resolver: Arc<MediaResolver>,
    bridge: Arc<MediaBridge>,
    events: EventBus,
    state: PlaybackState,
    selected_question: Option<String>,
    generation: u64,
    narration_cancel: Option<CancellationToken>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl PlaybackController {
    /// Create an idle controller and the channel its completions arrive on
    pub fn new(
        lesson: Arc<Lesson>,
        voice: Arc<VoiceAdapter>,
        resolver: Arc<MediaResolver>,
        bridge: Arc<MediaBridge>,
        events: EventBus,
    ) -> (Self, CompletionReceiver) {
        let (completions, rx) = mpsc::unbounded_channel();
        let controller = Self {
            lesson,
            voice,
            resolver,
            bridge,
            events,
            state: PlaybackState::default(),
            selected_question: None,
            generation: 0,
            narration_cancel: None,
            completions,
        };
        (controller, rx)
    }

    /// Read-only view of the current state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.clone()
    }

    pub fn selected_question(&self) -> Option<&str> {
        self.selected_question.as_deref()
    }

    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    /// Play/pause
    ///
    /// Starting builds a fresh queue from the selected question (or the whole
    /// lesson), shows media for item 0 and narrates it. Pausing stops both
    /// voice engines and clears the highlight but keeps `current_index`.
    pub async fn toggle_playback(&mut self) -> Result<()> {
        if self.state.is_playing {
            info!(index = self.state.current_index, "Pausing playback");
            self.halt_audio();
            self.state.is_playing = false;
            self.clear_highlight();
            self.emit_state();
            return Ok(());
        }

        let queue = self.build_queue();
        if queue.is_empty() {
            warn!("Nothing to play: lesson content produced an empty queue");
            return Ok(());
        }

        info!(items = queue.len(), "Starting playback");
        self.install_queue(queue);
        self.start_at(0).await;
        Ok(())
    }

    /// Start narrating at `item_id`
    ///
    /// Uses the current queue when it contains the item, otherwise builds a
    /// fresh one.
    pub async fn play_from(&mut self, item_id: &str) -> Result<()> {
        let index = match self.state.queue.position(item_id) {
            Some(index) => index,
            None => {
                let queue = self.build_queue();
                let index = queue
                    .position(item_id)
                    .ok_or_else(|| Error::NotFound(format!("queue item {}", item_id)))?;
                self.install_queue(queue);
                index
            }
        };

        info!(item_id, index, "Playing from item");
        self.halt_audio();
        self.start_at(index).await;
        Ok(())
    }

    /// Apply a completion signal
    ///
    /// Finished narrations advance the queue; cancelled or stale ones are
    /// ignored; a failure of both engines halts playback.
    pub async fn on_completion(&mut self, completion: Completion) {
        if completion.generation != self.generation {
            debug!(
                generation = completion.generation,
                current = self.generation,
                "Ignoring stale completion"
            );
            return;
        }

        match completion.outcome {
            NarrationOutcome::Cancelled => {
                debug!(index = completion.index, "Narration cancelled");
            }
            NarrationOutcome::Failed => {
                error!(index = completion.index, "Narration failed on every engine, halting playback");
                self.narration_cancel = None;
                self.state.is_playing = false;
                self.clear_highlight();
                self.emit_state();
            }
            NarrationOutcome::Finished => {
                if self.state.is_playing {
                    self.advance(completion.index).await;
                }
            }
        }
    }

    /// Silence narration without losing the position
    pub fn mute(&mut self) {
        if self.state.is_muted {
            return;
        }
        info!(index = self.state.current_index, "Muting");
        self.state.was_playing_before_mute = self.state.is_playing;
        self.halt_audio();
        self.state.is_muted = true;
        self.state.is_playing = false;
        self.emit_state();
    }

    /// Resume the item at `current_index` if playback was running when muted
    pub async fn unmute(&mut self) {
        if !self.state.is_muted {
            return;
        }
        let resume = self.state.was_playing_before_mute;
        self.state.is_muted = false;
        self.state.was_playing_before_mute = false;

        match usize::try_from(self.state.current_index) {
            Ok(index) if resume && index < self.state.queue.len() => {
                info!(index, "Unmuting, resuming narration");
                self.state.is_playing = true;
                self.narrate(index);
            }
            _ => debug!("Unmuting, staying idle"),
        }
        self.emit_state();
    }

    /// Change the selected question (`None` selects the whole lesson)
    ///
    /// While idle the question's media is shown (no audio). While playing
    /// only the pointer moves: the running queue is untouched until playback
    /// is stopped and restarted.
    pub async fn select_question(&mut self, question_id: Option<&str>) -> Result<()> {
        if let Some(id) = question_id {
            if !self.lesson.has_question(id) {
                return Err(Error::NotFound(format!("question {}", id)));
            }
        }
        self.selected_question = question_id.map(str::to_string);

        if self.state.is_playing {
            debug!(?question_id, "Selection changed during playback, queue unchanged");
            return Ok(());
        }

        if let Some(id) = question_id {
            if let Some(descriptor) = self.resolver.resolve_source(&self.lesson, id) {
                self.show_media(descriptor).await;
            }
        }
        Ok(())
    }

    /// Stop everything and return to an empty idle state
    pub fn close(&mut self) {
        info!("Closing playback controller");
        self.halt_audio();
        self.state = PlaybackState::default();
        self.emit_state();
    }

    fn build_queue(&self) -> ContentQueue {
        let selected = self
            .selected_question
            .as_deref()
            .and_then(|id| self.lesson.find_question(id));
        build_queue(&self.lesson, selected)
    }

    fn install_queue(&mut self, queue: ContentQueue) {
        self.halt_audio();
        self.events.emit_lossy(LessonEvent::QueueBuilt {
            item_ids: queue.ids(),
            timestamp: time::now(),
        });
        self.state = PlaybackState::idle(queue);
    }

    async fn start_at(&mut self, index: usize) {
        let Some(item) = self.state.queue.get(index).cloned() else {
            return;
        };
        self.state.is_playing = true;
        self.state.is_muted = false;
        self.state.was_playing_before_mute = false;

        let descriptor = self.resolver.resolve_item(&self.lesson, &item);
        self.show_media(descriptor).await;
        self.narrate(index);
        self.emit_state();
    }

    async fn advance(&mut self, finished: usize) {
        self.clear_highlight();
        let next = finished + 1;

        let Some(item) = self.state.queue.get(next).cloned() else {
            self.narration_cancel = None;
            self.state.current_index = self.state.queue.len() as i64;
            self.state.is_playing = false;
            info!(items = self.state.queue.len(), "Playback finished");
            self.events.emit_lossy(LessonEvent::PlaybackFinished {
                item_count: self.state.queue.len(),
                timestamp: time::now(),
            });
            self.emit_state();
            return;
        };

        if item.kind.drives_media() || self.lesson.has_question(&item.source_id) {
            let descriptor = self.resolver.resolve_item(&self.lesson, &item);
            self.show_media(descriptor).await;
        }
        self.narrate(next);
        self.emit_state();
    }

    /// Start narration of `index` in the background
    ///
    /// The previous narration is cancelled first, so two narrations never overlap.
    fn narrate(&mut self, index: usize) {
        let Some(item) = self.state.queue.get(index).cloned() else {
            return;
        };

        self.halt_audio();
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        self.narration_cancel = Some(cancel.clone());
        self.state.current_index = index as i64;
        self.state.highlighted_item_id = Some(item.id.clone());

        debug!(index, item_id = %item.id, generation, "Narrating item");
        let voice = Arc::clone(&self.voice);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = match voice.speak(&item.id, &item.text, cancel).await {
                Ok(Some(narration)) => narration.finished().await,
                // Nothing to say; move on
                Ok(None) => NarrationOutcome::Finished,
                Err(e) => {
                    error!(item_id = %item.id, error = %e, "Narration failed");
                    NarrationOutcome::Failed
                }
            };
            let _ = completions.send(Completion {
                generation,
                index,
                outcome,
            });
        });
    }

    /// Cancel the running narration and silence both engines
    fn halt_audio(&mut self) {
        if let Some(cancel) = self.narration_cancel.take() {
            cancel.cancel();
        }
        self.voice.stop();
    }

    async fn show_media(&self, descriptor: MediaDescriptor) {
        let outcome = self.bridge.request_display(descriptor).await;
        debug!(?outcome, "Media display requested");
    }

    fn clear_highlight(&mut self) {
        if self.state.highlighted_item_id.take().is_some() {
            self.events.emit_lossy(LessonEvent::HighlightCleared);
        }
    }

    fn emit_state(&self) {
        self.events.emit_lossy(LessonEvent::PlaybackStateChanged {
            snapshot: self.state.clone(),
            timestamp: time::now(),
        });
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.halt_audio();
    }
}
