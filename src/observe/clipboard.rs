//! Clipboard guard.

use anyhow::{anyhow, Result};

use crate::observe::{SignalOutcome, ViolationTrigger};
use crate::PageSignal;

/// Notice surfaced to the user on every suppressed clipboard action.
pub const CLIPBOARD_NOTICE: &str = "Copy/Paste is disabled during the test.";

/// Suppresses copy, cut, and paste for the duration of the session.
///
/// Every intercepted action is blocked (100% suppression, never sampled) and
/// answered with a blocking notice. Blocking is a policy enforcement action,
/// not a detection: the guard never emits a violation.
///
/// When the host environment cannot intercept the clipboard, the guard
/// reports the failure once per action and the session degrades silently;
/// the other triggers keep operating.
pub struct ClipboardGuard {
    available: bool,
}

impl ClipboardGuard {
    pub fn new() -> Self {
        Self { available: true }
    }

    /// A guard for environments without clipboard interception.
    pub fn unavailable() -> Self {
        Self { available: false }
    }
}

impl Default for ClipboardGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ViolationTrigger for ClipboardGuard {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn on_signal(&mut self, signal: &PageSignal) -> Result<SignalOutcome> {
        let PageSignal::Clipboard(_) = signal else {
            return Ok(SignalOutcome::Ignored);
        };

        if !self.available {
            return Err(anyhow!("clipboard interception unavailable in this host"));
        }

        Ok(SignalOutcome::Blocked {
            notice: CLIPBOARD_NOTICE,
        })
    }
}
