//! Simulation driver.
//!
//! `SimulatedGloves` stands in for the haptics runtime: a left and a right
//! glove plus one non-glove device become visible once a scan starts,
//! pairing completes after a configurable number of polls, and every motor
//! frame is kept so it can be inspected.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use vcr::consts::{POSITION_GLOVE_LEFT, POSITION_GLOVE_RIGHT};
use vcr::device::Device;
use vcr::driver::{ActuationSink, DiscoverySource, GloveDriver};
use vcr::pattern::{ALL_OFF, MotorFrame};

const DEFAULT_PAIR_LATENCY_POLLS: u32 = 2;

#[derive(Serialize)]
struct Snapshot<'a> {
    devices: &'a [Device],
}

#[derive(Debug, Default)]
struct SimState {
    scanning: bool,
    discovered: bool,
    devices: Vec<Device>,
    pending_pairs: HashMap<String, u32>,
    last_frames: HashMap<String, MotorFrame>,
    frames_sent: u64,
    stop_all_count: u64,
}

/// Software gloves implementing [`GloveDriver`].
#[derive(Debug)]
pub struct SimulatedGloves {
    pair_latency_polls: u32,
    state: Mutex<SimState>,
}

impl SimulatedGloves {
    /// Left glove, right glove and a vest, all unpaired.
    pub fn new() -> Self {
        let devices = vec![
            Device::new("sim-glove-l")
                .with_name("TactGlove (L)")
                .with_position(POSITION_GLOVE_LEFT),
            Device::new("sim-glove-r")
                .with_name("TactGlove (R)")
                .with_position(POSITION_GLOVE_RIGHT),
            Device::new("sim-vest").with_name("TactSuit").with_position("Vest"),
        ];
        Self {
            pair_latency_polls: DEFAULT_PAIR_LATENCY_POLLS,
            state: Mutex::new(SimState {
                devices: devices
                    .into_iter()
                    .map(|mut d| {
                        d.connected = Some(false);
                        d.paired = Some(false);
                        d
                    })
                    .collect(),
                ..SimState::default()
            }),
        }
    }

    /// Number of snapshots a pair request takes to show up.
    pub fn with_pair_latency(mut self, polls: u32) -> Self {
        self.pair_latency_polls = polls;
        self
    }

    /// Last frame sent to `position`.
    pub fn last_frame(&self, position: &str) -> Option<MotorFrame> {
        self.state.lock().last_frames.get(position).copied()
    }

    /// Frames sent since creation.
    pub fn frames_sent(&self) -> u64 {
        self.state.lock().frames_sent
    }

    /// Global stops since creation.
    pub fn stop_all_count(&self) -> u64 {
        self.state.lock().stop_all_count
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.state.lock().scanning
    }
}

impl Default for SimulatedGloves {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuationSink for SimulatedGloves {
    fn set_motors(&self, position: &str, frame: &MotorFrame) {
        let mut state = self.state.lock();
        state.frames_sent += 1;
        state.last_frames.insert(position.to_string(), *frame);
        let active: Vec<_> = frame
            .iter()
            .enumerate()
            .filter(|(_, amplitude)| **amplitude > 0)
            .map(|(motor, amplitude)| format!("{motor}:{amplitude}"))
            .collect();
        debug!(target: "sim", "{position} <- [{}]", active.join(" "));
    }

    fn stop_all(&self) {
        let mut state = self.state.lock();
        state.stop_all_count += 1;
        for frame in state.last_frames.values_mut() {
            *frame = ALL_OFF;
        }
        debug!(target: "sim", "stop all");
    }
}

impl DiscoverySource for SimulatedGloves {
    fn scan(&self) {
        let mut state = self.state.lock();
        state.scanning = true;
        state.discovered = true;
        info!(target: "sim", "Simulated scan started");
    }

    fn stop_scan(&self) {
        self.state.lock().scanning = false;
        info!(target: "sim", "Simulated scan stopped");
    }

    fn snapshot(&self) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        if !state.discovered {
            return None;
        }

        let mut completed = Vec::new();
        for (id, polls) in state.pending_pairs.iter_mut() {
            *polls = polls.saturating_sub(1);
            if *polls == 0 {
                completed.push(id.clone());
            }
        }
        for id in completed {
            state.pending_pairs.remove(&id);
            if let Some(device) = state.devices.iter_mut().find(|d| d.id == id) {
                device.connected = Some(true);
                device.paired = Some(true);
                info!(target: "sim", "{} paired", device.pretty_name());
            }
        }

        match serde_json::to_vec(&Snapshot {
            devices: &state.devices,
        }) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(target: "sim", "Failed to encode snapshot: {e}");
                None
            }
        }
    }

    fn pair(&self, id: &str) {
        let mut state = self.state.lock();
        if !state.devices.iter().any(|d| d.id == id) {
            warn!(target: "sim", "Pair requested for unknown device {id}");
            return;
        }
        let latency = self.pair_latency_polls.max(1);
        state.pending_pairs.insert(id.to_string(), latency);
    }

    fn unpair(&self, id: &str) {
        let mut state = self.state.lock();
        state.pending_pairs.remove(id);
        if let Some(device) = state.devices.iter_mut().find(|d| d.id == id) {
            device.connected = Some(false);
            device.paired = Some(false);
        }
    }
}

impl GloveDriver for SimulatedGloves {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
