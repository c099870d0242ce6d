//! Playback module
//!
//! **Components:**
//! - `queue_builder`: lesson/question → ordered content queue
//! - `controller`: play/pause/mute state machine with auto-advance

pub mod controller;
pub mod queue_builder;

pub use controller::{Completion, CompletionReceiver, PlaybackController};
pub use queue_builder::{build_for_lesson, build_for_question, build_queue};
