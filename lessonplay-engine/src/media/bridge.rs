//! Media Persistence Bridge
//!
//! Owns the single "current media" slot. Other components only request
//! writes through it:
//! - permanent (pinned) media is persisted under its source id and as
//!   "last selected", and cannot be replaced by ambient synchronization
//! - a reconciliation tick restores the stored pin whenever the slot holds
//!   non-permanent media
//! - a request for the asset already on screen is dropped
//!
//! Store failures are logged and the bridge keeps running without
//! persistence.

use super::MediaResolver;
use crate::db::media_store;
use lessonplay_common::events::{EventBus, LessonEvent};
use lessonplay_common::media::{canonical_url, MediaDescriptor};
use sqlx::{Pool, Sqlite};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the media panel shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPanel {
    pub descriptor: Option<MediaDescriptor>,
    pub visible: bool,
}

/// Result of a display request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// Shown as ambient (non-permanent) media
    Shown,
    /// Shown and pinned
    Pinned,
    /// Same asset already on screen; dropped
    Duplicate,
    /// Pinned media on screen; ambient request dropped
    BlockedByPermanent,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Slot already holds permanent media
    AlreadyPermanent,
    /// Stored pin was force-restored
    Restored(MediaDescriptor),
    /// Nothing pinned in the store
    NothingPinned,
    /// Running without a store, or the read failed
    StoreUnavailable,
}

struct Reconciler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Media Persistence Bridge
pub struct MediaBridge {
    panel: RwLock<MediaPanel>,
    store: Option<Pool<Sqlite>>,
    resolver: Arc<MediaResolver>,
    events: EventBus,
    reconciler: Mutex<Option<Reconciler>>,
}

impl MediaBridge {
    /// Create a bridge; `store = None` runs without permanence across reloads
    pub fn new(store: Option<Pool<Sqlite>>, resolver: Arc<MediaResolver>, events: EventBus) -> Self {
        if store.is_none() {
            warn!("Media store unavailable, pinned media will not survive reloads");
        }
        Self {
            panel: RwLock::new(MediaPanel::default()),
            store,
            resolver,
            events,
            reconciler: Mutex::new(None),
        }
    }

    /// Snapshot of the panel
    pub async fn panel(&self) -> MediaPanel {
        self.panel.read().await.clone()
    }

    /// Descriptor currently shown
    pub async fn current(&self) -> Option<MediaDescriptor> {
        self.panel.read().await.descriptor.clone()
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Consult the store once, before any ambient resolution runs
    ///
    /// Shows the last pinned media, if any, and returns it.
    pub async fn restore_on_mount(&self) -> Option<MediaDescriptor> {
        let stored = self.load_last_selected().await?;
        info!(source_id = %stored.source_id, "Restoring pinned media on mount");
        self.show(stored.clone()).await;
        self.events.emit_lossy(LessonEvent::MediaRestored {
            descriptor: stored.clone(),
        });
        Some(stored)
    }

    /// Show the pin stored for `source_id`, if there is one
    ///
    /// Never displaces the pin of another source: "last selected" stays
    /// with whatever is pinned on screen.
    pub async fn restore_for_source(&self, source_id: &str) -> Option<MediaDescriptor> {
        let store = self.store.as_ref()?;
        let stored = match media_store::load_permanent_media(store, source_id).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(source_id, error = %e, "Failed to read pinned media");
                return None;
            }
        };

        let mut panel = self.panel.write().await;
        if let Some(current) = &panel.descriptor {
            if current.is_permanent && current.source_id != source_id {
                debug!(
                    pinned = %current.source_id,
                    requested = source_id,
                    "Pinned media blocks restoring another source"
                );
                return None;
            }
        }
        panel.descriptor = Some(stored.clone());
        panel.visible = true;
        drop(panel);

        self.emit_changed(Some(stored.clone()), true);
        Some(stored)
    }

    /// Pin `descriptor`: show it and persist it
    pub async fn mark_permanent(&self, descriptor: MediaDescriptor) -> DisplayOutcome {
        let pinned = descriptor.pinned();
        info!(source_id = %pinned.source_id, url = %pinned.url, "Pinning media");
        self.show(pinned.clone()).await;

        if let Some(store) = &self.store {
            if let Err(e) = media_store::save_permanent_media(store, &pinned).await {
                warn!(source_id = %pinned.source_id, error = %e, "Failed to persist pinned media");
            }
        }

        DisplayOutcome::Pinned
    }

    /// Handle a display request from the controller or the event bus
    pub async fn request_display(&self, descriptor: MediaDescriptor) -> DisplayOutcome {
        {
            let panel = self.panel.read().await;
            if let Some(current) = &panel.descriptor {
                let duplicate = current.same_asset(&descriptor);
                if duplicate && (current.is_permanent || !descriptor.is_permanent) {
                    debug!(url = %descriptor.url, "Dropping duplicate display request");
                    return DisplayOutcome::Duplicate;
                }
                if current.is_permanent && !descriptor.is_permanent {
                    debug!(
                        pinned = %current.source_id,
                        requested = %descriptor.source_id,
                        "Pinned media blocks ambient display request"
                    );
                    return DisplayOutcome::BlockedByPermanent;
                }
            }
        }

        if descriptor.is_permanent {
            return self.mark_permanent(descriptor).await;
        }

        // Re-check under the write lock: a pin may have landed meanwhile
        let mut panel = self.panel.write().await;
        if panel.descriptor.as_ref().is_some_and(|d| d.is_permanent) {
            return DisplayOutcome::BlockedByPermanent;
        }
        panel.descriptor = Some(descriptor.clone());
        panel.visible = true;
        drop(panel);

        self.emit_changed(Some(descriptor), true);
        DisplayOutcome::Shown
    }

    /// One reconciliation pass; idempotent
    pub async fn reconcile(&self) -> ReconcileOutcome {
        if self.current_is_permanent().await {
            return ReconcileOutcome::AlreadyPermanent;
        }
        let stored = match self.store.as_ref() {
            Some(store) => match media_store::load_last_selected(store).await {
                Ok(Some(stored)) => stored,
                Ok(None) => return ReconcileOutcome::NothingPinned,
                Err(e) => {
                    warn!(error = %e, "Reconciliation could not read media store");
                    return ReconcileOutcome::StoreUnavailable;
                }
            },
            None => return ReconcileOutcome::StoreUnavailable,
        };

        let mut panel = self.panel.write().await;
        if panel.descriptor.as_ref().is_some_and(|d| d.is_permanent) {
            return ReconcileOutcome::AlreadyPermanent;
        }
        info!(source_id = %stored.source_id, "Reconciliation restored pinned media");
        panel.descriptor = Some(stored.clone());
        panel.visible = true;
        drop(panel);

        self.emit_changed(Some(stored.clone()), true);
        self.events.emit_lossy(LessonEvent::MediaRestored {
            descriptor: stored.clone(),
        });
        ReconcileOutcome::Restored(stored)
    }

    /// Remove the pin for `source_id` from the store and the slot
    pub async fn clear_permanent(&self, source_id: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = media_store::clear_permanent_media(store, source_id).await {
                warn!(source_id, error = %e, "Failed to clear pinned media");
            }
        }

        let mut panel = self.panel.write().await;
        if let Some(current) = panel.descriptor.as_mut() {
            if current.source_id == source_id {
                current.is_permanent = false;
            }
        }
    }

    /// The panel could not render `url`; show the placeholder in its place
    ///
    /// Returns the substituted descriptor, or `None` when `url` is no longer shown.
    pub async fn report_render_failure(&self, url: &str) -> Option<MediaDescriptor> {
        let mut panel = self.panel.write().await;
        let current = panel.descriptor.as_ref()?;
        if current.canonical_url() != canonical_url(url) {
            return None;
        }

        warn!(url, source_id = %current.source_id, "Media failed to render, showing placeholder");
        let mut placeholder = self.resolver.placeholder(&current.source_id);
        placeholder.is_permanent = current.is_permanent;
        panel.descriptor = Some(placeholder.clone());
        panel.visible = true;
        drop(panel);

        self.emit_changed(Some(placeholder.clone()), true);
        Some(placeholder)
    }

    /// Empty the slot when the user leaves the lesson
    ///
    /// Pins stay in the store and come back on the next mount.
    pub async fn release(&self) {
        let mut panel = self.panel.write().await;
        *panel = MediaPanel::default();
        drop(panel);
        self.emit_changed(None, false);
    }

    /// Start the recurring reconciliation tick, replacing any running one
    pub fn start_reconciler(self: &Arc<Self>, period: Duration) {
        let cancel = CancellationToken::new();
        let bridge: Weak<Self> = Arc::downgrade(self);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(bridge) = bridge.upgrade() else {
                            break;
                        };
                        bridge.reconcile().await;
                    }
                }
            }
            debug!("Reconciliation tick stopped");
        });

        let previous = self
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Reconciler { cancel, handle });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    pub fn reconciler_running(&self) -> bool {
        self.reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Cancel the reconciliation tick and wait for it to exit
    pub async fn shutdown(&self) {
        let reconciler = self
            .reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reconciler) = reconciler {
            reconciler.cancel.cancel();
            let _ = reconciler.handle.await;
        }
    }

    async fn current_is_permanent(&self) -> bool {
        self.panel
            .read()
            .await
            .descriptor
            .as_ref()
            .is_some_and(|d| d.is_permanent)
    }

    async fn load_last_selected(&self) -> Option<MediaDescriptor> {
        let store = self.store.as_ref()?;
        match media_store::load_last_selected(store).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read pinned media");
                None
            }
        }
    }

    async fn show(&self, descriptor: MediaDescriptor) {
        let mut panel = self.panel.write().await;
        panel.descriptor = Some(descriptor.clone());
        panel.visible = true;
        drop(panel);
        self.emit_changed(Some(descriptor), true);
    }

    fn emit_changed(&self, descriptor: Option<MediaDescriptor>, visible: bool) {
        self.events
            .emit_lossy(LessonEvent::MediaChanged { descriptor, visible });
    }
}

impl Drop for MediaBridge {
    fn drop(&mut self) {
        if let Some(reconciler) = self
            .reconciler
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reconciler.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonplay_common::db::init_memory_database;
    use lessonplay_common::media::MediaKind;

    fn resolver() -> Arc<MediaResolver> {
        Arc::new(MediaResolver::new("/images/placeholder.png", Vec::new()))
    }

    fn descriptor(source_id: &str, url: &str, permanent: bool) -> MediaDescriptor {
        MediaDescriptor {
            url: url.to_string(),
            kind: MediaKind::Image,
            title: String::new(),
            source_id: source_id.to_string(),
            is_external_domain: false,
            is_permanent: permanent,
        }
    }

    async fn bridge_with_store() -> MediaBridge {
        let db = init_memory_database().await.unwrap();
        MediaBridge::new(Some(db), resolver(), EventBus::new(64))
    }

    #[tokio::test]
    async fn test_ambient_display_shown() {
        let bridge = bridge_with_store().await;
        let outcome = bridge.request_display(descriptor("q1", "a.png?_t=1", false)).await;
        assert_eq!(outcome, DisplayOutcome::Shown);
        let panel = bridge.panel().await;
        assert!(panel.visible);
        assert_eq!(panel.descriptor.unwrap().source_id, "q1");
    }

    #[tokio::test]
    async fn test_duplicate_url_dropped() {
        let bridge = bridge_with_store().await;
        bridge.request_display(descriptor("q1", "a.png?_t=1", false)).await;
        let outcome = bridge.request_display(descriptor("q2", "a.png?_t=2", false)).await;
        assert_eq!(outcome, DisplayOutcome::Duplicate);
        assert_eq!(bridge.current().await.unwrap().source_id, "q1");
    }

    #[tokio::test]
    async fn test_pinned_media_blocks_ambient() {
        let bridge = bridge_with_store().await;
        bridge.mark_permanent(descriptor("ex-3", "pin.png", false)).await;

        let outcome = bridge.request_display(descriptor("q9", "other.png", false)).await;
        assert_eq!(outcome, DisplayOutcome::BlockedByPermanent);

        let current = bridge.current().await.unwrap();
        assert_eq!(current.source_id, "ex-3");
        assert!(current.is_permanent);
    }

    #[tokio::test]
    async fn test_restore_for_source_keeps_other_pin() {
        let bridge = bridge_with_store().await;
        bridge.mark_permanent(descriptor("q2", "two.png", true)).await;
        bridge.mark_permanent(descriptor("q1", "one.png", true)).await;

        assert!(bridge.restore_for_source("q2").await.is_none());
        let current = bridge.current().await.unwrap();
        assert_eq!(current.source_id, "q1");
        assert!(current.is_permanent);
        assert_eq!(bridge.reconcile().await, ReconcileOutcome::AlreadyPermanent);

        bridge.release().await;
        let restored = bridge.restore_for_source("q2").await.unwrap();
        assert_eq!(restored.source_id, "q2");
        assert_eq!(bridge.current().await.unwrap().source_id, "q2");
    }

    #[tokio::test]
    async fn test_new_pin_replaces_old_pin() {
        let bridge = bridge_with_store().await;
        bridge.mark_permanent(descriptor("a", "a.png", true)).await;
        let outcome = bridge.request_display(descriptor("b", "b.png", true)).await;
        assert_eq!(outcome, DisplayOutcome::Pinned);
        assert_eq!(bridge.current().await.unwrap().source_id, "b");
    }

    #[tokio::test]
    async fn test_pinning_shown_asset_upgrades_it() {
        let bridge = bridge_with_store().await;
        bridge.request_display(descriptor("a", "a.png?_t=1", false)).await;
        let outcome = bridge.request_display(descriptor("a", "a.png?_t=2", true)).await;
        assert_eq!(outcome, DisplayOutcome::Pinned);
        assert!(bridge.current().await.unwrap().is_permanent);
    }

    #[tokio::test]
    async fn test_reconcile_restores_pin_over_ambient() {
        let bridge = bridge_with_store().await;
        bridge.mark_permanent(descriptor("ex-3", "pin.png", true)).await;
        bridge.release().await;
        bridge.request_display(descriptor("q1", "ambient.png", false)).await;

        match bridge.reconcile().await {
            ReconcileOutcome::Restored(restored) => assert_eq!(restored.source_id, "ex-3"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(bridge.reconcile().await, ReconcileOutcome::AlreadyPermanent);
        assert_eq!(bridge.current().await.unwrap().source_id, "ex-3");
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_without_pin() {
        let bridge = bridge_with_store().await;
        bridge.request_display(descriptor("q1", "a.png", false)).await;

        assert_eq!(bridge.reconcile().await, ReconcileOutcome::NothingPinned);
        let first = bridge.current().await;
        assert_eq!(bridge.reconcile().await, ReconcileOutcome::NothingPinned);
        assert_eq!(bridge.current().await, first);
    }

    #[tokio::test]
    async fn test_degraded_mode_without_store() {
        let bridge = MediaBridge::new(None, resolver(), EventBus::new(8));
        assert!(!bridge.has_store());
        assert_eq!(bridge.mark_permanent(descriptor("a", "a.png", true)).await, DisplayOutcome::Pinned);
        bridge.release().await;
        assert_eq!(bridge.reconcile().await, ReconcileOutcome::StoreUnavailable);
        assert!(bridge.restore_on_mount().await.is_none());
    }

    #[tokio::test]
    async fn test_render_failure_substitutes_placeholder() {
        let bridge = bridge_with_store().await;
        bridge.request_display(descriptor("q1", "broken.png?_t=1", false)).await;

        assert!(bridge.report_render_failure("other.png").await.is_none());
        let substituted = bridge.report_render_failure("broken.png?_t=1").await.unwrap();
        assert!(substituted.url.starts_with("/images/placeholder.png?_t="));
        assert_eq!(substituted.source_id, "q1");
    }

    #[tokio::test]
    async fn test_clear_permanent_unpins() {
        let bridge = bridge_with_store().await;
        bridge.mark_permanent(descriptor("ex-3", "pin.png", true)).await;
        bridge.clear_permanent("ex-3").await;

        assert!(!bridge.current().await.unwrap().is_permanent);
        assert_eq!(bridge.reconcile().await, ReconcileOutcome::NothingPinned);
        let outcome = bridge.request_display(descriptor("q1", "next.png", false)).await;
        assert_eq!(outcome, DisplayOutcome::Shown);
    }

    #[tokio::test]
    async fn test_reconciler_task_lifecycle() {
        let bridge = Arc::new(bridge_with_store().await);
        bridge.mark_permanent(descriptor("ex-3", "pin.png", true)).await;
        bridge.release().await;

        bridge.start_reconciler(Duration::from_millis(10));
        assert!(bridge.reconciler_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(bridge.current().await.unwrap().source_id, "ex-3");

        bridge.shutdown().await;
        assert!(!bridge.reconciler_running());
    }
}
