//! Prelude module for common re-exports.
//!
//! ```rust
//! use vcr_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, GloveConfig, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_AMPLITUDE, MOTOR_CHANNELS};

// ─── Devices & Drivers ──────────────────────────────────────────────
pub use crate::device::Device;
pub use crate::driver::{ActuationSink, DiscoverySource, GloveDriver};

// ─── Patterns ───────────────────────────────────────────────────────
pub use crate::pattern::{
    ALL_OFF, MotorFrame, MotorSet, PatternKind, PatternSpec, StimulationLimits, VcrParams,
};

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
