use std::collections::HashMap;

use conveyor_core::WorkItem;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Pluggable fault-injection policy for exercising the redelivery path.
///
/// Consulted by the booking consumer once per processing attempt, *before*
/// the ledger is updated. Returning `Some(reason)` makes the attempt fail
/// with a `Rejected` outcome carrying that reason.
pub trait FaultPolicy: Send + Sync {
    /// Decide whether the given attempt should fail. `sequence` is the
    /// zero-based number of processing attempts the consumer has made so
    /// far, across all items.
    fn inject(&self, item: WorkItem, sequence: u64) -> Option<String>;
}

/// Policy that never injects a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultPolicy for NoFaults {
    fn inject(&self, _item: WorkItem, _sequence: u64) -> Option<String> {
        None
    }
}

/// Fail a random fraction of attempts after a warm-up count, mimicking a
/// flaky downstream dependency.
#[derive(Debug)]
pub struct RandomFaults {
    probability: f64,
    warmup: u64,
    rng: Mutex<SmallRng>,
}

impl RandomFaults {
    /// Create a policy that fails with the given probability (0.0 to 1.0)
    /// once `warmup` attempts have been made.
    #[must_use]
    pub fn new(probability: f64, warmup: u64) -> Self {
        Self {
            probability,
            warmup,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Same policy with a fixed RNG seed, for reproducible runs.
    #[must_use]
    pub fn seeded(probability: f64, warmup: u64, seed: u64) -> Self {
        Self {
            probability,
            warmup,
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl FaultPolicy for RandomFaults {
    fn inject(&self, item: WorkItem, sequence: u64) -> Option<String> {
        if sequence < self.warmup {
            return None;
        }
        if self.rng.lock().gen_bool(self.probability.clamp(0.0, 1.0)) {
            return Some(format!(
                "a mysterious and unexpected error has happened, unable to process {item}"
            ));
        }
        None
    }
}

/// Fail specific item ids a fixed number of times, then let them through.
///
/// Deterministic counterpart to [`RandomFaults`], used by tests that need a
/// known redelivery schedule.
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    remaining: Mutex<HashMap<u64, u32>>,
}

impl ScriptedFaults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the first `times` attempts for `id` fail.
    #[must_use]
    pub fn fail_id(self, id: u64, times: u32) -> Self {
        self.remaining.lock().insert(id, times);
        self
    }
}

impl FaultPolicy for ScriptedFaults {
    fn inject(&self, item: WorkItem, _sequence: u64) -> Option<String> {
        let mut remaining = self.remaining.lock();
        match remaining.get_mut(&item.id()) {
            Some(0) | None => None,
            Some(times) => {
                *times -= 1;
                Some(format!("scripted failure for {item}"))
            }
        }
    }
}
