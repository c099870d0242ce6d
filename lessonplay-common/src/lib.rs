//! # Lesson Player Common Library
//!
//! Shared code for the lesson playback engine and its hosts:
//! - Lesson input model (questions, exercise prompts, media fields)
//! - Content items and the playback queue
//! - Media descriptors and display requests
//! - Event types (LessonEvent enum) and the EventBus
//! - Bootstrap configuration loading
//! - SQLite store initialization

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod events;
pub mod lesson;
pub mod media;
pub mod time;

pub use content::{ContentItem, ContentKind, ContentQueue};
pub use error::{Error, Result};
pub use media::{DisplayRequest, MediaDescriptor, MediaKind};
