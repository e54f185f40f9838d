//! Proctoring Session Kernel
//!
//! This crate implements the state machine that owns one proctored test
//! attempt: camera acquisition, violation observation, countdown, and
//! outward reporting to the host page.
//!
//! # Architecture
//!
//! The kernel enforces four invariants by construction:
//!
//! 1. **Append-Only Log**: violation entries are never removed or reordered
//!    for the lifetime of a session.
//! 2. **Single Mutation Entry Point**: every trigger records through one
//!    append path; the host receives notifications, never log access.
//! 3. **Absorbed Failures**: no sub-component failure escalates past the
//!    session controller; the worst outcome is a degraded status.
//! 4. **Idempotent Teardown**: all hardware handles are released exactly
//!    once, including against acquisitions that resolve late.
//!
//! # Module Structure
//!
//! - `camera`: media acquisition (capture handles, permission outcomes)
//! - `observe`: violation triggers (focus loss, clipboard guard, periodic check)
//! - `clock`: countdown clock
//! - `session`: session controller composing the above
//! - `config`: daemon/host configuration
//! - Core types: ViolationKind, ViolationLog, CameraState, AttemptSummary

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub mod camera;
pub mod clock;
pub mod config;
pub mod observe;
pub mod session;
pub mod ui;

pub use camera::{CameraConfig, CameraFacing, CameraSource, CaptureHandle, PermissionError};
pub use clock::CountdownClock;
pub use config::ProctorConfig;
pub use observe::{ClipboardGuard, FocusTrigger, ObserverSet, PeriodicCheck, ViolationTrigger};
pub use session::{OverlayPosition, ProctorSession, SessionDisplayState, SignalDisposition};

// -------------------- Violation Kinds --------------------

/// Kinds of anomaly a proctoring session can record.
///
/// `TabSwitch` is the only kind produced by a real detector today; the other
/// four come from the periodic simulated check standing in for computer-vision
/// integration. The set is open to extension.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabSwitch,
    MultipleFaces,
    FaceNotVisible,
    LookingAway,
    UnknownPerson,
}

impl ViolationKind {
    /// Stable wire identifier, used by the host callback and attempt summary.
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::MultipleFaces => "multiple_faces",
            ViolationKind::FaceNotVisible => "face_not_visible",
            ViolationKind::LookingAway => "looking_away",
            ViolationKind::UnknownPerson => "unknown_person",
        }
    }

    /// Human-readable label for display surfaces.
    pub fn label(self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "Tab change detected",
            ViolationKind::MultipleFaces => "Multiple faces detected",
            ViolationKind::FaceNotVisible => "Face not visible",
            ViolationKind::LookingAway => "Looking away from screen",
            ViolationKind::UnknownPerson => "Unknown person detected",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------- Violation Log --------------------

/// One recorded anomaly.
///
/// `seq` is the insertion index; `offset_secs` is the whole-second offset
/// from session start. Insertion order is the authoritative ordering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub seq: u64,
    pub offset_secs: u64,
}

/// Append-only violation log, exclusively owned by one session controller.
///
/// All triggers record through [`ViolationLog::append`]; there is no removal
/// or reordering API. Outward parties see copies only.
#[derive(Debug, Default)]
pub struct ViolationLog {
    entries: Vec<ViolationEvent>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The single mutation entry point. Appends and returns the new entry.
    pub fn append(&mut self, kind: ViolationKind, offset: Duration) -> &ViolationEvent {
        let seq = self.entries.len() as u64;
        self.entries.push(ViolationEvent {
            kind,
            seq,
            offset_secs: offset.as_secs(),
        });
        self.entries.last().expect("entry just pushed")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries in chronological order.
    pub fn recent(&self, n: usize) -> Vec<ViolationKind> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].iter().map(|e| e.kind).collect()
    }

    pub fn count_of(&self, kind: ViolationKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViolationEvent> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ViolationEvent> {
        self.entries.clone()
    }
}

// -------------------- Camera State --------------------

/// Camera permission state for one session.
///
/// `Granted` is only ever entered together with a live capture handle;
/// any transition into `Denied` guarantees no handle is held.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl CameraState {
    /// Status label shown on display surfaces.
    pub fn label(self) -> &'static str {
        match self {
            CameraState::Unknown => "checking",
            CameraState::Granted => "active",
            CameraState::Denied => "denied",
        }
    }
}

// -------------------- Session Phase --------------------

/// Session-level lifecycle.
///
/// `Active` is re-entrant with respect to camera retries (Denied -> retry ->
/// Granted stays in `Active`). `TornDown` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Active,
    TornDown,
}

// -------------------- Page Signals --------------------

/// Clipboard operations intercepted by the clipboard guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipboardOp {
    Copy,
    Cut,
    Paste,
}

/// Input alphabet of the violation observers, delivered by the host event
/// loop. The signal stream is read-only shared broadcast; the kernel assumes
/// at most one active session consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSignal {
    VisibilityChanged { hidden: bool },
    Clipboard(ClipboardOp),
}

// -------------------- Attempt Summary --------------------

/// Final record handed to the attempt-submission collaborator once the
/// session ends. This is the only point at which violations leave the kernel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: String,
    pub violations: Vec<ViolationEvent>,
    pub violation_count: usize,
    pub focus_switches: usize,
    pub clipboard_blocks: u64,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
}

// -------------------- Attempt ID Discipline --------------------

/// A conforming attempt_id MUST be a local label, not free-form text.
/// We enforce a positive allowlist pattern to keep identifiers log-safe.
///
/// Allowed: "attempt:a1b2c3", "attempt:retake_2"
/// Disallowed: anything with whitespace, slashes, or punctuation outside [_-].
pub fn validate_attempt_id(attempt_id: &str) -> Result<()> {
    // Compile once for hot paths.
    static ATTEMPT_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re =
        ATTEMPT_ID_RE.get_or_init(|| regex::Regex::new(r"^attempt:[a-z0-9_-]{1,64}$").unwrap());

    let id = attempt_id.to_lowercase();
    if !re.is_match(&id) {
        return Err(anyhow!("attempt_id must match ^attempt:[a-z0-9_-]{{1,64}}$"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_log_is_append_only_and_ordered() {
        let mut log = ViolationLog::new();
        log.append(ViolationKind::TabSwitch, Duration::from_secs(3));
        log.append(ViolationKind::LookingAway, Duration::from_secs(70));
        log.append(ViolationKind::TabSwitch, Duration::from_secs(71));

        assert_eq!(log.len(), 3);
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(log.count_of(ViolationKind::TabSwitch), 2);
    }

    #[test]
    fn recent_is_chronological_and_bounded() {
        let mut log = ViolationLog::new();
        for kind in [
            ViolationKind::TabSwitch,
            ViolationKind::MultipleFaces,
            ViolationKind::FaceNotVisible,
            ViolationKind::UnknownPerson,
        ] {
            log.append(kind, Duration::from_secs(0));
        }

        assert_eq!(
            log.recent(3),
            vec![
                ViolationKind::MultipleFaces,
                ViolationKind::FaceNotVisible,
                ViolationKind::UnknownPerson,
            ]
        );
        assert_eq!(log.recent(10).len(), 4);
    }

    #[test]
    fn violation_kind_wire_ids_are_stable() {
        let json = serde_json::to_string(&ViolationKind::TabSwitch).unwrap();
        assert_eq!(json, "\"tab_switch\"");
        let back: ViolationKind = serde_json::from_str("\"multiple_faces\"").unwrap();
        assert_eq!(back, ViolationKind::MultipleFaces);
    }

    #[test]
    fn attempt_id_allowlist() {
        assert!(validate_attempt_id("attempt:a1b2c3").is_ok());
        assert!(validate_attempt_id("attempt:retake_2").is_ok());
        assert!(validate_attempt_id("Attempt:A1").is_ok()); // lowercased before match
        assert!(validate_attempt_id("attempt:").is_err());
        assert!(validate_attempt_id("attempt:has space").is_err());
        assert!(validate_attempt_id("candidate:x").is_err());
    }
}
