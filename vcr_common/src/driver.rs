//! Glove driver contracts.
//!
//! This module defines:
//! - `ActuationSink` trait - Where motor amplitude frames are sent
//! - `DiscoverySource` trait - Where device snapshots come from
//! - `GloveDriver` - Convenience bound for drivers implementing both
//!
//! Both sides are fire-and-forget: no call returns an error or an
//! acknowledgement. The core assumes eventual consistency through the next
//! discovery poll.

use crate::pattern::MotorFrame;

/// Receiver of motor commands.
///
/// Shared by every scheduled position; implementations must tolerate
/// concurrent, interleaved sends for different positions.
///
/// # Timing Contracts
///
/// | Operation     | Blocking | Acknowledged |
/// |---------------|----------|--------------|
/// | `set_motors()`| No       | No           |
/// | `stop_all()`  | No       | No           |
pub trait ActuationSink: Send + Sync {
    /// Set every motor of the glove at `position` to the given amplitudes.
    fn set_motors(&self, position: &str, frame: &MotorFrame);

    /// Global panic stop across all positions.
    fn stop_all(&self);
}

/// Source of device snapshots and pairing requests.
///
/// # Lifecycle
///
/// 1. `scan()` - Start background discovery
/// 2. `snapshot()` - Polled at a fixed cadence while scanning
/// 3. `stop_scan()` - Stop background discovery
pub trait DiscoverySource: Send + Sync {
    /// Start background discovery.
    fn scan(&self);

    /// Stop background discovery.
    fn stop_scan(&self);

    /// Serialized device list (bare JSON array or `{"devices": [...]}`).
    ///
    /// `None` when the transport has nothing to report this poll.
    fn snapshot(&self) -> Option<Vec<u8>>;

    /// Request pairing; completion is only visible in later snapshots.
    fn pair(&self, id: &str);

    /// Request unpairing; completion is only visible in later snapshots.
    fn unpair(&self, id: &str);
}

/// Driver providing both sides of the glove link.
pub trait GloveDriver: ActuationSink + DiscoverySource {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;
}
