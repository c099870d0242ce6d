//! # Lesson Playback Engine (lessonplay-engine)
//!
//! Narrates lesson content and keeps the media panel in sync with it.
//!
//! **Purpose:** Linearize a lesson (or a selected question) into a playback
//! queue, narrate it through a remote voice with a built-in fallback engine,
//! and resolve, pin and restore the media shown beside the narration.
//!
//! **Architecture:**
//! - `voice`: synthesis adapter over the remote engine, audio output and fallback engine
//! - `media`: resolver fallback chain and the persistence bridge owning the display slot
//! - `playback`: queue builder and the playback state machine
//! - `db`: durable key-value store for pinned media
//! - `session`: wiring of the above for one open lesson

pub mod db;
pub mod error;
pub mod media;
pub mod playback;
pub mod session;
pub mod voice;

pub use error::{Error, Result};
pub use session::LessonSession;
