//! Focus-loss detector.

use anyhow::Result;

use crate::observe::{SignalOutcome, ViolationTrigger};
use crate::{PageSignal, ViolationKind};

/// Detects the page going hidden and records one `TabSwitch` per hide.
///
/// The visibility stream may redeliver the current state (some environments
/// emit "still hidden" signals); only a visible-to-hidden transition counts,
/// so the recorded total equals the number of hide transitions, never the
/// number of raw deliveries.
pub struct FocusTrigger {
    hidden: bool,
}

impl FocusTrigger {
    pub fn new() -> Self {
        Self { hidden: false }
    }
}

impl Default for FocusTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ViolationTrigger for FocusTrigger {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn on_signal(&mut self, signal: &PageSignal) -> Result<SignalOutcome> {
        let PageSignal::VisibilityChanged { hidden } = signal else {
            return Ok(SignalOutcome::Ignored);
        };

        let was_hidden = self.hidden;
        self.hidden = *hidden;

        if *hidden && !was_hidden {
            Ok(SignalOutcome::Violation(ViolationKind::TabSwitch))
        } else {
            Ok(SignalOutcome::Ignored)
        }
    }
}
