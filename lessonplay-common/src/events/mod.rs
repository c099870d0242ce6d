//! Event types for the lesson player event system
//!
//! Provides the shared event definitions and the EventBus used by sibling UI
//! pieces to request media changes without coupling to the controller.

mod playback_types;

pub use playback_types::{PlaybackState, IDLE_INDEX};

use crate::media::{DisplayRequest, MediaDescriptor};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lesson player event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so
/// they can be forwarded to a UI unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LessonEvent {
    /// A UI piece asks the media panel to show something
    ///
    /// Handled by the media persistence bridge: duplicate URLs are dropped and
    /// non-permanent requests cannot replace pinned media.
    DisplayRequested {
        request: DisplayRequest,
    },

    /// A UI piece asks for the resolved media of a question or exercise
    FallbackMediaRequested {
        source_id: String,
    },

    /// Narration of an item started; highlight it and scroll to the anchor
    HighlightRequested {
        item_id: String,
        /// Anchor to scroll into view smoothly, when one is registered
        scroll_to: Option<String>,
    },

    /// Previous highlight no longer applies
    HighlightCleared,

    /// A fresh playback queue was built
    QueueBuilt {
        item_ids: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback controller transitioned
    PlaybackStateChanged {
        snapshot: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Media panel content changed
    MediaChanged {
        descriptor: Option<MediaDescriptor>,
        visible: bool,
    },

    /// Pinned media was restored from the durable store
    MediaRestored {
        descriptor: MediaDescriptor,
    },

    /// Last queue item finished narrating
    PlaybackFinished {
        item_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LessonEvent {
    /// Short event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::DisplayRequested { .. } => "DisplayRequested",
            Self::FallbackMediaRequested { .. } => "FallbackMediaRequested",
            Self::HighlightRequested { .. } => "HighlightRequested",
            Self::HighlightCleared => "HighlightCleared",
            Self::QueueBuilt { .. } => "QueueBuilt",
            Self::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            Self::MediaChanged { .. } => "MediaChanged",
            Self::MediaRestored { .. } => "MediaRestored",
            Self::PlaybackFinished { .. } => "PlaybackFinished",
        }
    }
}

/// Broadcast bus shared by the engine components and the UI
///
/// Cloning is cheap; every clone publishes on the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LessonEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use lessonplay_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LessonEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LessonEvent,
    ) -> Result<usize, broadcast::error::SendError<LessonEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LessonEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
