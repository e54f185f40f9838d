//! Countdown clock.
//!
//! The clock is purely observational: it counts a fixed test duration down to
//! zero, one decrement per wall-clock second boundary, and stops there.
//! Reaching zero never ends the session or submits the attempt; that decision
//! belongs to the host page observing `remaining_seconds() == 0`.

use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);

/// Countdown from a fixed total to zero.
///
/// Driven by [`CountdownClock::advance`] with the current instant; each call
/// applies exactly the ticks whose second boundaries have elapsed, so a host
/// loop may poll at any cadence without drift. Invariant:
/// `0 <= remaining_seconds <= total_seconds`, non-increasing.
#[derive(Debug)]
pub struct CountdownClock {
    total_seconds: u32,
    remaining_seconds: u32,
    /// Next second boundary; `None` once expired or cancelled.
    next_tick_at: Option<Instant>,
}

impl CountdownClock {
    /// Start counting down `total_seconds` from `now`.
    pub fn start(total_seconds: u32, now: Instant) -> Self {
        Self {
            total_seconds,
            remaining_seconds: total_seconds,
            next_tick_at: if total_seconds == 0 {
                None
            } else {
                Some(now + TICK)
            },
        }
    }

    /// Apply every tick due at or before `now`. Returns the number applied.
    ///
    /// Clamps at zero: once `remaining_seconds` reaches 0 no further tick is
    /// scheduled, so a later call is a no-op rather than a negative count.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let mut applied = 0;
        while let Some(due) = self.next_tick_at {
            if now < due {
                break;
            }
            self.remaining_seconds -= 1;
            applied += 1;
            self.next_tick_at = if self.remaining_seconds == 0 {
                None
            } else {
                Some(due + TICK)
            };
        }
        applied
    }

    /// Stop ticking. No tick is applied after cancellation, even if a second
    /// boundary had already passed when `advance` is next called.
    pub fn cancel(&mut self) {
        self.next_tick_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick_at.is_some()
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.total_seconds - self.remaining_seconds
    }

    /// Fraction of the test time consumed, in `[0, 1]`.
    pub fn progress_fraction(&self) -> f64 {
        if self.total_seconds == 0 {
            return 1.0;
        }
        f64::from(self.elapsed_seconds()) / f64::from(self.total_seconds)
    }

    /// Integer percentage `round(100 * elapsed / total)`, in `[0, 100]`.
    pub fn progress_percent(&self) -> u8 {
        (self.progress_fraction() * 100.0).round() as u8
    }

    /// Remaining time formatted `MM:SS`, zero-padded.
    pub fn format_remaining(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }
}
