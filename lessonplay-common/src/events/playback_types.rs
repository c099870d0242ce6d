//! Playback state snapshot types

use crate::content::{ContentItem, ContentQueue};
use serde::{Deserialize, Serialize};

/// `current_index` value before the first item starts
pub const IDLE_INDEX: i64 = -1;

/// Snapshot of the playback controller, exposed after every transition
///
/// `current_index` is `-1` while idle, advances by one per narration
/// completion and is terminal once it equals the queue length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub queue: ContentQueue,
    pub current_index: i64,
    pub is_playing: bool,
    pub is_muted: bool,
    pub was_playing_before_mute: bool,
    pub highlighted_item_id: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::idle(ContentQueue::new())
    }
}

impl PlaybackState {
    /// Fresh idle state over a queue
    pub fn idle(queue: ContentQueue) -> Self {
        Self {
            queue,
            current_index: IDLE_INDEX,
            is_playing: false,
            is_muted: false,
            was_playing_before_mute: false,
            highlighted_item_id: None,
        }
    }

    /// Item at `current_index`, if any
    pub fn current_item(&self) -> Option<&ContentItem> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|index| self.queue.get(index))
    }

    pub fn is_idle(&self) -> bool {
        self.current_index == IDLE_INDEX
    }

    /// Every item has been narrated
    pub fn is_terminal(&self) -> bool {
        !self.queue.is_empty() && self.current_index == self.queue.len() as i64
    }

    /// Fraction of the queue completed, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.queue.is_empty() || self.current_index < 0 {
            return 0.0;
        }
        (self.current_index as f64 / self.queue.len() as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKind;

    fn queue(n: usize) -> ContentQueue {
        ContentQueue::from_items(
            (0..n)
                .map(|i| ContentItem {
                    id: format!("item-{}", i),
                    text: format!("text {}", i),
                    kind: ContentKind::Prompt,
                    source_id: "q1".to_string(),
                    media_url: None,
                })
                .collect(),
        )
    }

    #[test]
    fn test_idle_state() {
        let state = PlaybackState::idle(queue(3));
        assert!(state.is_idle());
        assert!(!state.is_terminal());
        assert!(state.current_item().is_none());
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn test_progress_and_terminal() {
        let mut state = PlaybackState::idle(queue(4));
        state.current_index = 1;
        assert_eq!(state.current_item().map(|i| i.id.as_str()), Some("item-1"));
        assert_eq!(state.progress(), 0.25);

        state.current_index = 4;
        assert!(state.is_terminal());
        assert!(state.current_item().is_none());
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_empty_queue_is_never_terminal() {
        let state = PlaybackState::default();
        assert!(!state.is_terminal());
        assert_eq!(state.progress(), 0.0);
    }
}
