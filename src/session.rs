//! Proctoring session controller.
//!
//! Composes media acquisition, the violation triggers, and the countdown
//! clock into one unit scoped to a single test attempt. The controller:
//! 1. Schedules the delayed first camera acquisition
//! 2. Routes page signals through the triggers
//! 3. Records violations through one append-then-notify entry point
//! 4. Derives the display state as a pure function of its parts
//! 5. Releases every sub-resource exactly once at teardown
//!
//! No sub-component failure escalates past this module. The host page sees
//! violations through its callback and everything else through
//! [`SessionDisplayState`].

use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

use crate::camera::CameraSource;
use crate::clock::CountdownClock;
use crate::config::ProctorConfig;
use crate::observe::{ClipboardGuard, FocusTrigger, ObserverSet, PeriodicCheck};
use crate::{
    AttemptSummary, CameraState, PageSignal, SessionPhase, ViolationKind, ViolationLog,
};

/// Host callback invoked once per recorded violation, no batching.
pub type ViolationCallback = Box<dyn FnMut(ViolationKind)>;

/// Cosmetic overlay anchor for the proctoring panel. Toggling it has no
/// effect on proctoring.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    #[default]
    Right,
    Left,
}

impl OverlayPosition {
    fn toggled(self) -> Self {
        match self {
            OverlayPosition::Right => OverlayPosition::Left,
            OverlayPosition::Left => OverlayPosition::Right,
        }
    }
}

/// What the host should do with a page signal it just delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalDisposition {
    /// Nothing to act on.
    Ignored,
    /// A violation was recorded (the callback already fired).
    Recorded(ViolationKind),
    /// The action was suppressed; show `notice` as a blocking dialog.
    Blocked { notice: &'static str },
}

/// Snapshot of everything a host page renders.
///
/// Derived on demand and never stored; see [`derive_display`].
#[derive(Clone, Debug, Serialize)]
pub struct SessionDisplayState {
    pub violation_count: usize,
    /// Last three violations, chronological.
    pub recent_violations: Vec<ViolationKind>,
    pub focus_switches: usize,
    pub clipboard_blocks: u64,
    pub camera: CameraState,
    /// Remaining time, `MM:SS`, zero-padded.
    pub remaining: String,
    /// `round(100 * elapsed / total)`, in `[0, 100]`.
    pub progress_percent: u8,
    pub position: OverlayPosition,
}

/// Pure derivation of the display state from the session's parts.
///
/// Keeping this a single function of the whole state (rather than a set of
/// independently mutated presentation fields) rules out inconsistent partial
/// updates by construction.
fn derive_display(
    log: &ViolationLog,
    camera: CameraState,
    clock: &CountdownClock,
    clipboard_blocks: u64,
    position: OverlayPosition,
) -> SessionDisplayState {
    SessionDisplayState {
        violation_count: log.len(),
        recent_violations: log.recent(3),
        focus_switches: log.count_of(ViolationKind::TabSwitch),
        clipboard_blocks,
        camera,
        remaining: clock.format_remaining(),
        progress_percent: clock.progress_percent(),
        position,
    }
}

/// One proctoring session, coincident with one test attempt.
///
/// Driven by the host event loop: deliver signals with
/// [`ProctorSession::handle_signal`] and time with
/// [`ProctorSession::advance`]. The violation log and the capture handle are
/// exclusively owned here; two sessions never share them.
pub struct ProctorSession {
    attempt_id: String,
    phase: SessionPhase,
    started_at: Instant,
    camera: CameraSource,
    /// Deadline for the delayed first acquisition; `None` once fired or
    /// cancelled.
    acquisition_due_at: Option<Instant>,
    observers: ObserverSet,
    clock: CountdownClock,
    log: ViolationLog,
    clipboard_blocks: u64,
    position: OverlayPosition,
    on_violation: ViolationCallback,
}

impl ProctorSession {
    /// Mount a session now. See [`ProctorSession::mount_at`].
    pub fn mount(
        config: ProctorConfig,
        on_violation: impl FnMut(ViolationKind) + 'static,
    ) -> Result<Self> {
        Self::mount_at(config, on_violation, Instant::now())
    }

    /// Mount a session at `now`: open the camera source, schedule its delayed
    /// first acquisition, install the triggers, start the clock.
    ///
    /// The first acquisition is deferred (default 1.5s) so it cannot race the
    /// host page's own initialization.
    pub fn mount_at(
        config: ProctorConfig,
        on_violation: impl FnMut(ViolationKind) + 'static,
        now: Instant,
    ) -> Result<Self> {
        config.validate()?;

        let camera = CameraSource::open(config.camera.clone())?;

        let mut observers = ObserverSet::new();
        observers.install(FocusTrigger::new(), now);
        observers.install(ClipboardGuard::new(), now);
        let check = match config.check_seed {
            Some(seed) => {
                PeriodicCheck::with_seed(config.check_interval, config.check_probability, seed)
            }
            None => PeriodicCheck::new(config.check_interval, config.check_probability),
        };
        observers.install(check, now);

        log::info!(
            "proctoring session mounted for {} ({} min, camera {})",
            config.attempt_id,
            config.test_time_minutes,
            config.camera.source
        );

        Ok(Self {
            attempt_id: config.attempt_id.clone(),
            phase: SessionPhase::Initializing,
            started_at: now,
            camera,
            acquisition_due_at: Some(now + config.acquisition_delay),
            observers,
            clock: CountdownClock::start(config.total_seconds(), now),
            log: ViolationLog::new(),
            clipboard_blocks: 0,
            position: OverlayPosition::default(),
            on_violation: Box::new(on_violation),
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.state()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.clock.remaining_seconds()
    }

    /// Route one page signal through the triggers. No-op once torn down.
    pub fn handle_signal(&mut self, signal: &PageSignal, now: Instant) -> SignalDisposition {
        if self.phase == SessionPhase::TornDown {
            return SignalDisposition::Ignored;
        }

        let result = self.observers.dispatch(signal);
        let mut disposition = SignalDisposition::Ignored;
        for kind in result.violations {
            self.record_violation(kind, now);
            disposition = SignalDisposition::Recorded(kind);
        }
        if let Some(notice) = result.blocked {
            self.clipboard_blocks += 1;
            disposition = SignalDisposition::Blocked { notice };
        }
        disposition
    }

    /// Apply everything due at or before `now`: the delayed first camera
    /// acquisition, countdown ticks, and periodic checks. No-op once torn
    /// down.
    pub fn advance(&mut self, now: Instant) {
        if self.phase == SessionPhase::TornDown {
            return;
        }

        if let Some(due) = self.acquisition_due_at {
            if now >= due {
                self.acquisition_due_at = None;
                let state = self.camera.acquire();
                self.phase = SessionPhase::Active;
                log::info!("initial camera acquisition resolved: {}", state.label());
            }
        }

        self.clock.advance(now);

        for kind in self.observers.poll_due(now) {
            self.record_violation(kind, now);
        }
    }

    /// Manual camera retry. Valid while the session is live; a Denied camera
    /// becoming Granted here stays within the `Active` phase.
    pub fn retry_camera(&mut self) -> CameraState {
        if self.phase == SessionPhase::TornDown {
            return self.camera.state();
        }
        self.camera.acquire()
    }

    /// Flip the simulated camera permission (synthetic sources only).
    pub fn set_simulated_permission(&mut self, granted: bool) {
        self.camera.set_simulated_permission(granted);
    }

    /// Toggle the overlay anchor. Cosmetic only.
    pub fn toggle_position(&mut self) {
        self.position = self.position.toggled();
    }

    /// Current display snapshot; safe to call at any time, including after
    /// teardown.
    pub fn display_state(&self) -> SessionDisplayState {
        derive_display(
            &self.log,
            self.camera.state(),
            &self.clock,
            self.clipboard_blocks,
            self.position,
        )
    }

    /// The single mutation entry point: append to the log, then notify the
    /// host. Every trigger records through here, which keeps ordering
    /// deterministic and would localize locking if the kernel ever moved off
    /// a single event loop.
    fn record_violation(&mut self, kind: ViolationKind, now: Instant) {
        let offset = now.saturating_duration_since(self.started_at);
        self.log.append(kind, offset);
        log::warn!(
            "violation #{} recorded: {}",
            self.log.len(),
            kind.label()
        );
        (self.on_violation)(kind);
    }

    /// Release every sub-resource. Idempotent: a second call is a no-op, and
    /// the camera source discards any acquisition still in flight.
    ///
    /// This must run exactly once per session however the attempt ends
    /// (submission, forced navigation, time expiry); callers that cannot
    /// guarantee an explicit call rely on `Drop`.
    pub fn teardown(&mut self) {
        if self.phase == SessionPhase::TornDown {
            return;
        }
        self.phase = SessionPhase::TornDown;
        self.acquisition_due_at = None;
        self.camera.shutdown();
        self.observers.clear();
        self.clock.cancel();
        log::info!("proctoring session for {} torn down", self.attempt_id);
    }

    /// Tear down and produce the final tally for the attempt-submission
    /// collaborator.
    pub fn finish(&mut self) -> AttemptSummary {
        self.teardown();
        AttemptSummary {
            attempt_id: self.attempt_id.clone(),
            violations: self.log.to_vec(),
            violation_count: self.log.len(),
            focus_switches: self.log.count_of(ViolationKind::TabSwitch),
            clipboard_blocks: self.clipboard_blocks,
            elapsed_seconds: self.clock.elapsed_seconds(),
            total_seconds: self.clock.total_seconds(),
        }
    }
}

impl Drop for ProctorSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
