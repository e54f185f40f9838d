//! Violation triggers.
//!
//! This module provides the independent observers that feed a session's
//! violation log:
//! - Focus-loss detector (page visibility)
//! - Clipboard guard (copy/cut/paste suppression)
//! - Periodic simulated check (placeholder for real computer-vision)
//!
//! Triggers produce a lazy, unbounded sequence of violations over the life of
//! one session; a new session needs fresh trigger instances. The observer
//! layer is responsible for:
//! - Emitting at most one violation per delivered signal or interval tick
//! - Absorbing per-trigger failures so the remaining triggers keep operating
//!
//! Triggers MUST NOT:
//! - Mutate the violation log directly (the session owns the append path)
//! - Let an error escape their own boundary

mod clipboard;
mod focus;
mod periodic;

pub use clipboard::ClipboardGuard;
pub use focus::FocusTrigger;
pub use periodic::PeriodicCheck;

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::{PageSignal, ViolationKind};

/// Outcome of routing one page signal through a trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Signal is not this trigger's concern.
    Ignored,
    /// A violation to record.
    Violation(ViolationKind),
    /// The action was suppressed; surface `notice` to the user. Not a
    /// violation.
    Blocked { notice: &'static str },
}

/// Violation trigger trait.
///
/// Implementations react to page signals, to a fixed interval, or both.
/// Errors returned here are absorbed by [`ObserverSet`]; a failing trigger
/// degrades silently and never disturbs its peers.
pub trait ViolationTrigger {
    /// Trigger identifier, used in degraded-mode log lines.
    fn name(&self) -> &'static str;

    /// React to a page signal. At most one outcome per delivered signal.
    fn on_signal(&mut self, _signal: &PageSignal) -> Result<SignalOutcome> {
        Ok(SignalOutcome::Ignored)
    }

    /// Polling cadence for time-driven triggers; `None` when signal-only.
    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    /// Interval hook for time-driven triggers. 0 or 1 violation per tick.
    fn on_interval(&mut self) -> Result<Option<ViolationKind>> {
        Ok(None)
    }
}

/// Aggregated result of dispatching one signal across all triggers.
#[derive(Debug, Default)]
pub struct DispatchResult {
    pub violations: Vec<ViolationKind>,
    pub blocked: Option<&'static str>,
}

struct InstalledTrigger {
    trigger: Box<dyn ViolationTrigger>,
    /// Next interval deadline; `None` for signal-only triggers.
    next_due: Option<Instant>,
}

/// Owns the triggers of one session.
///
/// Dispatch order is installation order, which keeps the violation log's
/// ordering deterministic for a given delivery order of signals.
#[derive(Default)]
pub struct ObserverSet {
    triggers: Vec<InstalledTrigger>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self {
            triggers: Vec::new(),
        }
    }

    /// Install a trigger. Time-driven triggers get their first deadline one
    /// full interval after `now`.
    pub fn install<T: ViolationTrigger + 'static>(&mut self, trigger: T, now: Instant) {
        let next_due = trigger.poll_interval().map(|interval| now + interval);
        self.triggers.push(InstalledTrigger {
            trigger: Box::new(trigger),
            next_due,
        });
    }

    /// Route one page signal through every trigger.
    ///
    /// A trigger returning an error is logged and skipped; the remaining
    /// triggers still see the signal.
    pub fn dispatch(&mut self, signal: &PageSignal) -> DispatchResult {
        let mut result = DispatchResult::default();
        for installed in &mut self.triggers {
            match installed.trigger.on_signal(signal) {
                Ok(SignalOutcome::Ignored) => {}
                Ok(SignalOutcome::Violation(kind)) => result.violations.push(kind),
                Ok(SignalOutcome::Blocked { notice }) => result.blocked = Some(notice),
                Err(e) => {
                    log::warn!(
                        "trigger {} failed on signal, degrading: {}",
                        installed.trigger.name(),
                        e
                    );
                }
            }
        }
        result
    }

    /// Run every time-driven trigger whose deadline has passed, possibly
    /// multiple times when `now` jumped more than one interval ahead.
    pub fn poll_due(&mut self, now: Instant) -> Vec<ViolationKind> {
        let mut violations = Vec::new();
        for installed in &mut self.triggers {
            let Some(interval) = installed.trigger.poll_interval() else {
                continue;
            };
            while let Some(due) = installed.next_due {
                if now < due {
                    break;
                }
                installed.next_due = Some(due + interval);
                match installed.trigger.on_interval() {
                    Ok(Some(kind)) => violations.push(kind),
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!(
                            "trigger {} failed on interval, degrading: {}",
                            installed.trigger.name(),
                            e
                        );
                    }
                }
            }
        }
        violations
    }

    /// Drop every trigger. Used at teardown; the set is not refillable into
    /// the same session.
    pub fn clear(&mut self) {
        self.triggers.clear();
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingTrigger;

    impl ViolationTrigger for FailingTrigger {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn on_signal(&mut self, _signal: &PageSignal) -> Result<SignalOutcome> {
            Err(anyhow!("host environment does not support this hook"))
        }
    }

    #[test]
    fn failing_trigger_does_not_starve_peers() {
        let now = Instant::now();
        let mut set = ObserverSet::new();
        set.install(FailingTrigger, now);
        set.install(FocusTrigger::new(), now);

        let result = set.dispatch(&PageSignal::VisibilityChanged { hidden: true });
        assert_eq!(result.violations, vec![ViolationKind::TabSwitch]);
    }

    #[test]
    fn poll_due_catches_up_over_large_jumps() {
        let now = Instant::now();
        let mut set = ObserverSet::new();
        // Probability 1.0: every due tick yields a violation.
        set.install(
            PeriodicCheck::with_seed(Duration::from_secs(60), 1.0, 7),
            now,
        );

        let fired = set.poll_due(now + Duration::from_secs(600));
        assert_eq!(fired.len(), 10);
    }

    #[test]
    fn clear_empties_the_set() {
        let now = Instant::now();
        let mut set = ObserverSet::new();
        set.install(FocusTrigger::new(), now);
        assert_eq!(set.len(), 1);
        set.clear();
        assert!(set.is_empty());
        let result = set.dispatch(&PageSignal::VisibilityChanged { hidden: true });
        assert!(result.violations.is_empty());
    }
}
