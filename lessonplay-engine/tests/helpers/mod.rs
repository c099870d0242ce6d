//! Test helper modules for lesson playback integration tests
//!
//! - `voice_fakes`: scripted remote synthesizer and manually finished engines
//! - `lessons`: lesson fixtures

#![allow(dead_code)]

pub mod lessons;
pub mod voice_fakes;

pub use lessons::{empty_lesson, sample_lesson, test_config};
pub use voice_fakes::{ManualEngine, ScriptedSynthesizer};

use lessonplay_common::events::LessonEvent;
use std::time::Duration;
use tokio::sync::broadcast;

/// Generous upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(2);

/// Poll `check` until it holds or [`WAIT`] elapses
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Drain every event currently buffered on `rx`
pub fn drain(rx: &mut broadcast::Receiver<LessonEvent>) -> Vec<LessonEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
