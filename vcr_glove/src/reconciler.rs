//! Device state reconciliation.
//!
//! Discovery snapshots are authoritative but stale: a pair request can take
//! several polls to show up. The reconciler merges each snapshot with an
//! overlay of optimistic state written the moment the user asks to pair or
//! disconnect, so the displayed list reflects intent immediately.
//!
//! ## Pipeline
//! ```text
//! raw bytes ─► parse (bare list │ {"devices": [...]}) ─► gloves only
//!           ─► collapse ids (last wins) ─► overlay upgrade ─► sort by position
//! ```
//!
//! ## Overlay rule
//! A field already `Some(true)` in the snapshot is never touched. Otherwise
//! the overlay value, when present, replaces it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vcr::device::Device;

/// Optimistic connection state recorded at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OverlayEntry {
    /// Expected link state.
    pub connected: Option<bool>,
    /// Expected bond state.
    pub paired: Option<bool>,
}

impl OverlayEntry {
    /// Entry written by a pair request.
    pub const PAIRED: Self = Self {
        connected: Some(true),
        paired: Some(true),
    };

    /// Entry written by a disconnect request.
    pub const DISCONNECTED: Self = Self {
        connected: Some(false),
        paired: Some(false),
    };
}

#[derive(Deserialize)]
struct SnapshotWrapper {
    #[serde(default)]
    devices: Option<Vec<Device>>,
}

/// Decode a discovery payload.
///
/// Accepts a bare JSON array of devices or an object with a `devices` array
/// (a missing `devices` key reads as empty). The bare array is tried first.
/// Returns `None` when neither shape parses.
pub fn parse_snapshot(raw: &[u8]) -> Option<Vec<Device>> {
    if let Ok(list) = serde_json::from_slice::<Vec<Device>>(raw) {
        return Some(list);
    }
    serde_json::from_slice::<SnapshotWrapper>(raw)
        .ok()
        .map(|w| w.devices.unwrap_or_default())
}

/// Owner of the optimistic overlay.
#[derive(Debug, Default)]
pub struct DeviceReconciler {
    overlay: HashMap<String, OverlayEntry>,
}

impl DeviceReconciler {
    /// Reconciler with an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that pairing was requested for `id`.
    pub fn request_pair(&mut self, id: &str) {
        self.overlay.insert(id.to_string(), OverlayEntry::PAIRED);
    }

    /// Record that a disconnect was requested for `id`.
    pub fn request_disconnect(&mut self, id: &str) {
        self.overlay.insert(id.to_string(), OverlayEntry::DISCONNECTED);
    }

    /// Current overlay entry for `id`.
    pub fn overlay(&self, id: &str) -> Option<OverlayEntry> {
        self.overlay.get(id).copied()
    }

    /// Parse and reconcile a raw payload; malformed input yields no devices.
    pub fn reconcile(&self, raw: &[u8]) -> Vec<Device> {
        parse_snapshot(raw)
            .map(|devices| self.reconcile_devices(devices))
            .unwrap_or_default()
    }

    /// Reconcile an already decoded snapshot.
    pub fn reconcile_devices(&self, snapshot: Vec<Device>) -> Vec<Device> {
        let mut by_id: HashMap<String, Device> = HashMap::with_capacity(snapshot.len());
        for device in snapshot.into_iter().filter(Device::is_glove) {
            by_id.insert(device.id.clone(), device);
        }

        let mut devices: Vec<Device> = by_id
            .into_values()
            .map(|mut device| {
                if let Some(entry) = self.overlay.get(&device.id) {
                    apply_overlay(&mut device, entry);
                }
                device
            })
            .collect();

        devices.sort_by(|a, b| {
            a.position_tag()
                .cmp(b.position_tag())
                .then_with(|| a.id.cmp(&b.id))
        });
        devices
    }
}

fn apply_overlay(device: &mut Device, entry: &OverlayEntry) {
    if device.connected != Some(true) {
        device.connected = entry.connected.or(device.connected);
    }
    if device.paired != Some(true) {
        device.paired = entry.paired.or(device.paired);
    }
}
