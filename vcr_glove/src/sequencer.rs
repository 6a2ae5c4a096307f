//! Cyclic-burst sequencing.
//!
//! One vCR cycle fires every selected motor exactly once, alone, in a fresh
//! random order. Activations are staggered by a fixed step; each activation
//! is followed by an all-off `burst_ms` later.

use rand::RngCore;
use rand::seq::SliceRandom;
use std::time::Duration;
use vcr::consts::{BURST_STAGGER, MAX_AMPLITUDE, MAX_BURST_MS, MOTOR_CHANNELS};
use vcr::pattern::MotorSet;

/// One staggered activation within a cycle, relative to the cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstCommand {
    /// Motor index.
    pub motor: u8,
    /// Amplitude, percent.
    pub amplitude: u8,
    /// Delay from cycle start to activation.
    pub on_offset: Duration,
    /// Time the motor stays on before the all-off.
    pub hold: Duration,
}

impl BurstCommand {
    /// Delay from cycle start to the matching all-off.
    pub fn off_offset(&self) -> Duration {
        self.on_offset + self.hold
    }
}

/// Planner for one cyclic-burst cycle.
#[derive(Debug, Clone, Copy)]
pub struct BurstSequencer {
    stagger: Duration,
}

impl Default for BurstSequencer {
    fn default() -> Self {
        Self {
            stagger: BURST_STAGGER,
        }
    }
}

impl BurstSequencer {
    /// Sequencer with a custom activation step.
    pub fn with_stagger(stagger: Duration) -> Self {
        Self { stagger }
    }

    /// Activation step between consecutive motors.
    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Shuffle `motors` and lay them out on the stagger grid.
    ///
    /// An empty set yields no commands.
    pub fn plan_cycle(
        &self,
        amplitude: u8,
        burst_ms: u64,
        motors: MotorSet,
        rng: &mut (dyn RngCore + Send),
    ) -> heapless::Vec<BurstCommand, MOTOR_CHANNELS> {
        let amplitude = amplitude.min(MAX_AMPLITUDE);
        let hold = Duration::from_millis(burst_ms.min(MAX_BURST_MS));

        let mut order = motors.to_vec();
        order.as_mut_slice().shuffle(rng);

        let mut plan = heapless::Vec::new();
        for (step, motor) in (0u32..).zip(order) {
            let command = BurstCommand {
                motor,
                amplitude,
                on_offset: self.stagger * step,
                hold,
            };
            if plan.push(command).is_err() {
                break;
            }
        }
        plan
    }
}
