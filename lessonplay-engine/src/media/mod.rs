//! Media resolution and the media panel slot
//!
//! **Components:**
//! - `resolver`: fallback chain from lesson fields to a displayable descriptor
//! - `bridge`: owner of the single "current media" slot, with permanence,
//!   persistence and the reconciliation tick

mod bridge;
mod resolver;

pub use bridge::{DisplayOutcome, MediaBridge, MediaPanel, ReconcileOutcome};
pub use resolver::{CacheBuster, MediaResolver, MediaSource};
