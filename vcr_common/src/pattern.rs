//! Stimulation pattern types.
//!
//! - [`PatternKind`] - What a cycle tick does
//! - [`MotorSet`] - Participating motor indices (bit set, 20 channels)
//! - [`MotorFrame`] - One full amplitude vector for the actuation sink
//! - [`PatternSpec`] - Everything a scheduled task needs, passed by value
//! - [`StimulationLimits`] / [`VcrParams`] - Caller-side clamping of UI input

use crate::consts::{
    FALLBACK_CYCLE_INTERVAL, LONG_BUZZ_SECONDS, MAX_AMPLITUDE, MIN_CYCLE_INTERVAL,
    MOTOR_CHANNELS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Pattern executed by a stimulation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// All motors on at every tick.
    #[default]
    Constant,
    /// All motors on during even elapsed seconds, off during odd ones.
    Pulse,
    /// All motors on every fifth elapsed second, silent otherwise.
    Intermittent,
    /// Staggered single-motor bursts over a shuffled motor subset.
    #[serde(alias = "vcr", alias = "v_cr")]
    CyclicBurst,
}

impl PatternKind {
    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Pulse => "pulse",
            Self::Intermittent => "intermittent",
            Self::CyclicBurst => "vCR",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Amplitude vector covering every motor channel of one glove.
pub type MotorFrame = [u8; MOTOR_CHANNELS];

/// Frame with every motor off.
pub const ALL_OFF: MotorFrame = [0; MOTOR_CHANNELS];

/// Frame with every motor at `amplitude` (clamped to 100).
pub fn uniform_frame(amplitude: u8) -> MotorFrame {
    [amplitude.min(MAX_AMPLITUDE); MOTOR_CHANNELS]
}

/// Frame with only `motor` at `amplitude`; out-of-range motors yield all-off.
pub fn single_motor_frame(motor: u8, amplitude: u8) -> MotorFrame {
    let mut frame = ALL_OFF;
    if let Some(slot) = frame.get_mut(usize::from(motor)) {
        *slot = amplitude.min(MAX_AMPLITUDE);
    }
    frame
}

/// Set of motor indices below [`MOTOR_CHANNELS`].
///
/// Indices outside the channel width are dropped on insertion; duplicates
/// collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MotorSet(u32);

impl MotorSet {
    /// Empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The first `count` motors (`0..count`), clamped to the channel width.
    pub fn first(count: usize) -> Self {
        Self::from_indices(0..count.min(MOTOR_CHANNELS))
    }

    /// Build from arbitrary indices, dropping anything out of range.
    pub fn from_indices<I, T>(indices: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: TryInto<u8>,
    {
        let mut set = Self::empty();
        for idx in indices {
            if let Ok(idx) = idx.try_into() {
                set.insert(idx);
            }
        }
        set
    }

    /// Insert one motor. Returns false if the index is out of range.
    pub fn insert(&mut self, motor: u8) -> bool {
        if usize::from(motor) >= MOTOR_CHANNELS {
            return false;
        }
        self.0 |= 1 << motor;
        true
    }

    /// Membership test.
    pub fn contains(&self, motor: u8) -> bool {
        usize::from(motor) < MOTOR_CHANNELS && self.0 & (1 << motor) != 0
    }

    /// Number of motors in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True when no motor participates.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Motor indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + use<> {
        let bits = self.0;
        (0..MOTOR_CHANNELS as u8).filter(move |m| bits & (1 << *m) != 0)
    }

    /// Indices as a fixed-capacity vector, ready to shuffle.
    pub fn to_vec(&self) -> heapless::Vec<u8, MOTOR_CHANNELS> {
        // Cannot overflow: at most MOTOR_CHANNELS bits are ever set.
        self.iter().collect()
    }
}

impl Serialize for MotorSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for MotorSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let indices = Vec::<u32>::deserialize(deserializer)?;
        Ok(Self::from_indices(indices))
    }
}

/// Parameters of one stimulation task.
///
/// Copied into the scheduler on `start`; the per-tick logic reads it by
/// value and never through shared state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    /// What each tick does.
    pub kind: PatternKind,
    /// Motor amplitude, percent (0–100).
    pub amplitude: u8,
    /// Tick rate.
    pub cycle_hz: f64,
    /// Per-motor on time for cyclic bursts.
    pub burst_ms: u64,
    /// Motors taking part in cyclic bursts.
    pub motors: MotorSet,
    /// Session length; `None` runs until stopped.
    pub total_seconds: Option<u64>,
}

impl PatternSpec {
    /// Long buzz preset for the given kind, timed at one hour.
    ///
    /// Constant ticks five times a second to approximate continuous output;
    /// pulse and intermittent tick once a second so that the tick index and
    /// the elapsed second coincide.
    pub fn long_buzz(kind: PatternKind) -> Self {
        let (amplitude, cycle_hz) = match kind {
            PatternKind::Constant => (100, 5.0),
            PatternKind::Pulse => (80, 1.0),
            PatternKind::Intermittent => (70, 1.0),
            PatternKind::CyclicBurst => (70, 1.5),
        };
        Self {
            kind,
            amplitude,
            cycle_hz,
            burst_ms: 100,
            motors: MotorSet::first(MOTOR_CHANNELS),
            total_seconds: Some(LONG_BUZZ_SECONDS),
        }
    }

    /// Untimed cyclic-burst session.
    pub fn vcr(amplitude: u8, cycle_hz: f64, burst_ms: u64, motors: MotorSet) -> Self {
        Self {
            kind: PatternKind::CyclicBurst,
            amplitude: amplitude.min(MAX_AMPLITUDE),
            cycle_hz,
            burst_ms,
            motors,
            total_seconds: None,
        }
    }

    /// Builder-style session length.
    pub fn with_total_seconds(mut self, seconds: Option<u64>) -> Self {
        self.total_seconds = seconds;
        self
    }

    /// Interval between ticks, floored at [`MIN_CYCLE_INTERVAL`].
    pub fn cycle_interval(&self) -> Duration {
        cycle_interval(self.cycle_hz)
    }
}

/// `1 / hz`, floored at [`MIN_CYCLE_INTERVAL`].
///
/// Non-finite or non-positive frequencies map to [`FALLBACK_CYCLE_INTERVAL`].
pub fn cycle_interval(hz: f64) -> Duration {
    if !hz.is_finite() || hz <= 0.0 {
        return FALLBACK_CYCLE_INTERVAL;
    }
    let secs = 1.0 / hz;
    if secs < MIN_CYCLE_INTERVAL.as_secs_f64() {
        return MIN_CYCLE_INTERVAL;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(FALLBACK_CYCLE_INTERVAL)
}

/// Documented input ranges for vCR parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulationLimits {
    /// Amplitude range, percent.
    pub amplitude: (u8, u8),
    /// Cycle frequency range, Hz.
    pub cycle_hz: (f64, f64),
    /// Burst duration range, ms.
    pub burst_ms: (u64, u64),
    /// Motor count range.
    pub motor_count: (usize, usize),
}

impl Default for StimulationLimits {
    fn default() -> Self {
        Self {
            amplitude: (0, 100),
            cycle_hz: (0.5, 6.0),
            burst_ms: (20, 300),
            motor_count: (1, 8),
        }
    }
}

/// Raw vCR parameters as entered by a user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcrParams {
    /// Amplitude, percent.
    pub amplitude: f64,
    /// Cycle frequency, Hz.
    pub cycle_hz: f64,
    /// Burst duration, ms.
    pub burst_ms: f64,
    /// Number of motors, counted from index 0.
    pub motor_count: f64,
}

impl Default for VcrParams {
    fn default() -> Self {
        Self {
            amplitude: 70.0,
            cycle_hz: 1.5,
            burst_ms: 100.0,
            motor_count: 4.0,
        }
    }
}

impl VcrParams {
    /// Clamp every field into `limits` and build an untimed vCR spec.
    ///
    /// NaN inputs collapse to the lower bound.
    pub fn clamped(&self, limits: &StimulationLimits) -> PatternSpec {
        let amplitude = clamp_f64(
            self.amplitude,
            f64::from(limits.amplitude.0),
            f64::from(limits.amplitude.1),
        ) as u8;
        let cycle_hz = clamp_f64(self.cycle_hz, limits.cycle_hz.0, limits.cycle_hz.1);
        let burst_ms = clamp_f64(
            self.burst_ms,
            limits.burst_ms.0 as f64,
            limits.burst_ms.1 as f64,
        ) as u64;
        let motor_count = clamp_f64(
            self.motor_count,
            limits.motor_count.0 as f64,
            limits.motor_count.1 as f64,
        ) as usize;
        PatternSpec::vcr(amplitude, cycle_hz, burst_ms, MotorSet::first(motor_count))
    }
}

fn clamp_f64(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}
