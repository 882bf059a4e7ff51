//! Dashboard overlay session: one overlay + thumbnail pair and its
//! visibility-driven image swap loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use crate::runtime::{InputMethod, OverlayCapability, OverlayError, OverlayId};

/// Lifecycle states of the owned overlay pair.
///
/// `Created -> Configured -> Running -> Destroyed`, with repeated
/// `Configured -> Configured` allowed. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Configured,
    Running,
    Destroyed,
}

/// Owns exactly one dashboard overlay + thumbnail pair.
///
/// Per-tick runtime failures in the poll loop are swallowed and logged at
/// `warn` so a transient hiccup does not take the session down; cancellation
/// destroys the pair exactly once and nothing touches the handle afterwards.
pub struct DashboardOverlaySession {
    overlay: Arc<dyn OverlayCapability>,
    handle: OverlayId,
    thumbnail: OverlayId,
    key: String,
    state: SessionState,
}

impl std::fmt::Debug for DashboardOverlaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardOverlaySession")
            .field("handle", &self.handle)
            .field("thumbnail", &self.thumbnail)
            .field("key", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl DashboardOverlaySession {
    /// Request the dashboard overlay + thumbnail pair and set the thumbnail
    /// image. A failed thumbnail set unwinds the freshly created pair before
    /// the error is surfaced.
    pub fn create(
        overlay: Arc<dyn OverlayCapability>,
        key: &str,
        name: &str,
        thumbnail_path: &Path,
    ) -> Result<Self, OverlayError> {
        let (handle, thumbnail) = overlay.create_dashboard_overlay(key, name)?;
        if let Err(err) = overlay.set_image_file(thumbnail, thumbnail_path) {
            let _ = overlay.destroy(handle);
            return Err(err);
        }
        debug!("created dashboard overlay {key:?} (handle {handle}, thumbnail {thumbnail})");
        Ok(Self {
            overlay,
            handle,
            thumbnail,
            key: key.to_string(),
            state: SessionState::Created,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> OverlayId {
        self.handle
    }

    pub fn thumbnail(&self) -> OverlayId {
        self.thumbnail
    }

    /// Set static presentation properties. May be repeated any number of
    /// times before the poll loop starts.
    pub fn configure(
        &mut self,
        width_meters: f32,
        input_method: InputMethod,
    ) -> Result<(), OverlayError> {
        match self.state {
            SessionState::Created | SessionState::Configured => {}
            SessionState::Running => {
                return Err(OverlayError::InvalidState("session is already running"))
            }
            SessionState::Destroyed => {
                return Err(OverlayError::InvalidState("session is destroyed"))
            }
        }
        self.overlay.set_width_meters(self.handle, width_meters)?;
        self.overlay.set_input_method(self.handle, input_method)?;
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Poll visibility until `cancel` carries `true`, swapping in
    /// `primary_image` whenever the overlay is shown in the dashboard.
    ///
    /// Each iteration sleeps one interval, with the sleep itself raced
    /// against the cancellation channel, then re-checks cancellation before
    /// touching the runtime. On exit the overlay pair is destroyed.
    pub async fn run(
        &mut self,
        primary_image: &Path,
        poll_interval: Duration,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), OverlayError> {
        if self.state != SessionState::Configured {
            return Err(OverlayError::InvalidState(
                "session must be configured before running",
            ));
        }
        self.state = SessionState::Running;
        info!(
            "dashboard overlay {:?} polling every {:?}",
            self.key, poll_interval
        );

        while !*cancel.borrow() {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // Sender gone; treat as cancellation.
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {
                    if *cancel.borrow() {
                        break;
                    }
                    self.tick(primary_image);
                }
            }
        }

        self.destroy();
        Ok(())
    }

    /// One poll iteration: query visibility, swap the image when visible.
    fn tick(&self, primary_image: &Path) {
        match self.overlay.is_visible(self.handle) {
            Ok(true) => {
                if let Err(err) = self.overlay.set_image_file(self.handle, primary_image) {
                    warn!("overlay image swap failed: {err}");
                }
            }
            Ok(false) => {}
            Err(err) => warn!("overlay visibility query failed: {err}"),
        }
    }

    /// Destroy the overlay pair. Safe to call any number of times; only the
    /// first call reaches the runtime, so a handle is never used after its
    /// destruction.
    pub fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        self.state = SessionState::Destroyed;
        match self.overlay.destroy(self.handle) {
            Ok(()) => debug!("destroyed dashboard overlay {:?}", self.key),
            Err(err) => warn!("overlay destroy failed: {err}"),
        }
    }
}

impl Drop for DashboardOverlaySession {
    fn drop(&mut self) {
        // Backstop for sessions that never reached the cancellation path.
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimRuntime};

    fn session(sim: &Arc<SimRuntime>) -> DashboardOverlaySession {
        DashboardOverlaySession::create(
            sim.overlay_capability(),
            "slate.test",
            "Slate Test",
            Path::new("thumb.png"),
        )
        .expect("overlay creation succeeds")
    }

    #[test]
    fn create_sets_the_thumbnail_image() {
        let sim = SimRuntime::headset();
        let session = session(&sim);

        let sets = sim.image_sets_for(session.thumbnail());
        assert_eq!(sets, vec![std::path::PathBuf::from("thumb.png")]);
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let sim = SimRuntime::headset();
        let _first = session(&sim);
        let second = DashboardOverlaySession::create(
            sim.overlay_capability(),
            "slate.test",
            "Slate Test",
            Path::new("thumb.png"),
        );
        assert_eq!(
            second.unwrap_err(),
            OverlayError::KeyInUse("slate.test".to_string())
        );
    }

    #[test]
    fn failed_thumbnail_set_unwinds_the_pair() {
        let sim = SimRuntime::headset();
        sim.fail_image_sets(true);

        let result = DashboardOverlaySession::create(
            sim.overlay_capability(),
            "slate.test",
            "Slate Test",
            Path::new("thumb.png"),
        );
        assert!(matches!(result, Err(OverlayError::Backend(_))));

        // The pair was destroyed, so the key is free again.
        sim.fail_image_sets(false);
        let _retry = session(&sim);
    }

    #[test]
    fn configure_repeats_before_running() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);

        session.configure(2.5, InputMethod::Mouse).unwrap();
        session.configure(1.5, InputMethod::None).unwrap();
        assert_eq!(session.state(), SessionState::Configured);
    }

    #[test]
    fn configure_after_destroy_is_rejected() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);

        session.destroy();
        assert_eq!(session.state(), SessionState::Destroyed);
        assert!(matches!(
            session.configure(2.5, InputMethod::Mouse),
            Err(OverlayError::InvalidState(_))
        ));
    }

    #[test]
    fn destroy_is_idempotent_at_the_session_layer() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        let handle = session.handle();

        session.destroy();
        session.destroy();

        let destroys = sim
            .events()
            .iter()
            .filter(|event| {
                matches!(event, SimEvent::DestroyOverlay { overlay } if *overlay == handle)
            })
            .count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn visible_tick_swaps_exactly_one_image() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        session.configure(2.5, InputMethod::Mouse).unwrap();

        sim.set_visible(true);
        session.tick(Path::new("primary.png"));

        let sets = sim.image_sets_for(session.handle());
        assert_eq!(sets, vec![std::path::PathBuf::from("primary.png")]);
    }

    #[test]
    fn hidden_tick_swaps_nothing() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        session.configure(2.5, InputMethod::Mouse).unwrap();

        sim.set_visible(false);
        session.tick(Path::new("primary.png"));

        assert!(sim.image_sets_for(session.handle()).is_empty());
    }

    #[test]
    fn failing_ticks_are_swallowed() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        session.configure(2.5, InputMethod::Mouse).unwrap();

        sim.set_visible(true);
        sim.fail_visibility(true);
        session.tick(Path::new("primary.png"));
        sim.fail_visibility(false);
        sim.fail_image_sets(true);
        session.tick(Path::new("primary.png"));
        sim.fail_image_sets(false);
        session.tick(Path::new("primary.png"));

        // The session survived both failure modes and kept polling.
        assert_eq!(sim.image_sets_for(session.handle()).len(), 1);
        assert_eq!(session.state(), SessionState::Configured);
    }

    #[tokio::test]
    async fn run_requires_a_configured_session() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        let (_tx, rx) = watch::channel(false);

        let result = session
            .run(Path::new("primary.png"), Duration::from_millis(1), rx)
            .await;
        assert!(matches!(result, Err(OverlayError::InvalidState(_))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_sleep_and_destroys() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        session.configure(2.5, InputMethod::Mouse).unwrap();

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        // A long interval: only an interruptible sleep lets this finish.
        session
            .run(Path::new("primary.png"), Duration::from_secs(3600), rx)
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Destroyed);
        assert!(!sim.overlay_alive(session.handle()));
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_cancellation() {
        let sim = SimRuntime::headset();
        let mut session = session(&sim);
        session.configure(2.5, InputMethod::Mouse).unwrap();

        let (tx, rx) = watch::channel(false);
        drop(tx);

        session
            .run(Path::new("primary.png"), Duration::from_secs(3600), rx)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Destroyed);
    }
}
