//! System-wide constants for the vCR workspace.
//!
//! Single source of truth for channel widths, timing floors and default
//! cadences. Imported by all crates; no duplicates elsewhere.

use std::time::Duration;

/// Number of motor channels in one actuation frame.
pub const MOTOR_CHANNELS: usize = 20;

/// Maximum amplitude accepted by the actuation sink (percent).
pub const MAX_AMPLITUDE: u8 = 100;

/// Fixed stagger between consecutive single-motor bursts within a cycle.
pub const BURST_STAGGER: Duration = Duration::from_millis(100);

/// Longest burst the sequencer will hold a motor on for.
pub const MAX_BURST_MS: u64 = 1000;

/// Floor on the cycle interval; bounds the command rate per position.
pub const MIN_CYCLE_INTERVAL: Duration = Duration::from_millis(100);

/// Interval used when a cycle frequency is zero, negative or not finite.
pub const FALLBACK_CYCLE_INTERVAL: Duration = Duration::from_secs(1);

/// Period of the intermittent pattern, in elapsed seconds.
pub const INTERMITTENT_PERIOD_S: u64 = 5;

/// Default discovery poll cadence while scanning.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 800;

/// Default delay before refreshing after a pair request.
pub const DEFAULT_PAIR_REFRESH_DELAY_MS: u64 = 800;

/// Default delay before refreshing after a disconnect request.
pub const DEFAULT_DISCONNECT_REFRESH_DELAY_MS: u64 = 600;

/// Default delay before refreshing after a disconnect-all request.
pub const DEFAULT_DISCONNECT_ALL_REFRESH_DELAY_MS: u64 = 1000;

/// Amplitude of the confirmation buzz sent once a device is paired.
pub const DEFAULT_AUTO_BUZZ_AMPLITUDE: u8 = 70;

/// Length of the "long buzz" session started by the toggle.
pub const LONG_BUZZ_SECONDS: u64 = 3600;

/// Default in-memory audit log capacity.
pub const DEFAULT_AUDIT_CAPACITY: usize = 500;

/// Conventional position tag of the left glove.
pub const POSITION_GLOVE_LEFT: &str = "GloveL";

/// Conventional position tag of the right glove.
pub const POSITION_GLOVE_RIGHT: &str = "GloveR";
