//! Periodic simulated check.

use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::observe::ViolationTrigger;
use crate::ViolationKind;

/// Kinds the simulated check can emit. `TabSwitch` is excluded: focus loss
/// has a real detector.
const SIMULATED_KINDS: [ViolationKind; 4] = [
    ViolationKind::MultipleFaces,
    ViolationKind::FaceNotVisible,
    ViolationKind::LookingAway,
    ViolationKind::UnknownPerson,
];

/// Simulated camera-analysis check, standing in for real computer-vision
/// integration.
///
/// On each interval tick there is a fixed probability of emitting one
/// violation, picked uniformly from the four simulated kinds. A production
/// detector replaces this trigger but must preserve the contract: 0 or 1
/// violation per tick, reported through the session's append path.
pub struct PeriodicCheck {
    interval: Duration,
    probability: f64,
    rng: StdRng,
}

impl PeriodicCheck {
    pub fn new(interval: Duration, probability: f64) -> Self {
        Self::with_rng(interval, probability, StdRng::from_entropy())
    }

    /// Deterministic check for tests and reproducible demos.
    pub fn with_seed(interval: Duration, probability: f64, seed: u64) -> Self {
        Self::with_rng(interval, probability, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(interval: Duration, probability: f64, rng: StdRng) -> Self {
        Self {
            interval,
            probability,
            rng,
        }
    }

    /// One draw of the simulation. Exposed so a harness can replay the
    /// sequence a given seed produces.
    pub fn draw(&mut self) -> Option<ViolationKind> {
        if self.rng.gen::<f64>() < self.probability {
            Some(SIMULATED_KINDS[self.rng.gen_range(0..SIMULATED_KINDS.len())])
        } else {
            None
        }
    }
}

impl ViolationTrigger for PeriodicCheck {
    fn name(&self) -> &'static str {
        "periodic-check"
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn on_interval(&mut self) -> Result<Option<ViolationKind>> {
        Ok(self.draw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() -> Result<()> {
        let mut a = PeriodicCheck::with_seed(Duration::from_secs(60), 0.1, 42);
        let mut b = PeriodicCheck::with_seed(Duration::from_secs(60), 0.1, 42);

        for _ in 0..100 {
            assert_eq!(a.on_interval()?, b.on_interval()?);
        }
        Ok(())
    }

    #[test]
    fn probability_zero_never_fires() -> Result<()> {
        let mut check = PeriodicCheck::with_seed(Duration::from_secs(60), 0.0, 1);
        for _ in 0..100 {
            assert_eq!(check.on_interval()?, None);
        }
        Ok(())
    }

    #[test]
    fn probability_one_always_fires_simulated_kinds() -> Result<()> {
        let mut check = PeriodicCheck::with_seed(Duration::from_secs(60), 1.0, 1);
        for _ in 0..100 {
            let kind = check.on_interval()?.expect("must fire at probability 1");
            assert_ne!(kind, ViolationKind::TabSwitch);
        }
        Ok(())
    }
}
