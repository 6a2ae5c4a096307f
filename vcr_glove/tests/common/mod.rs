//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use vcr::clock::{Clock, ManualClock};
use vcr::config::GloveConfig;
use vcr::driver::{ActuationSink, DiscoverySource, GloveDriver};
use vcr::pattern::MotorFrame;
use vcr_glove::GloveEngine;

/// One frame as seen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub at: Duration,
    pub position: String,
    pub frame: MotorFrame,
}

impl SentFrame {
    /// Indices of motors that are on.
    pub fn active_motors(&self) -> Vec<usize> {
        self.frame
            .iter()
            .enumerate()
            .filter(|(_, amplitude)| **amplitude > 0)
            .map(|(motor, _)| motor)
            .collect()
    }

    pub fn is_all_off(&self) -> bool {
        self.frame.iter().all(|amplitude| *amplitude == 0)
    }
}

/// Driver that records everything and replays scripted snapshots.
///
/// Snapshots are served from a queue; the last one is repeated once the
/// queue runs dry.
pub struct RecordingDriver {
    clock: ManualClock,
    pub frames: Mutex<Vec<SentFrame>>,
    pub stop_all_at: Mutex<Vec<Duration>>,
    pub pairs: Mutex<Vec<String>>,
    pub unpairs: Mutex<Vec<String>>,
    pub scans: Mutex<usize>,
    pub stop_scans: Mutex<usize>,
    snapshots: Mutex<VecDeque<Option<Vec<u8>>>>,
    last_snapshot: Mutex<Option<Vec<u8>>>,
}

impl RecordingDriver {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            frames: Mutex::new(Vec::new()),
            stop_all_at: Mutex::new(Vec::new()),
            pairs: Mutex::new(Vec::new()),
            unpairs: Mutex::new(Vec::new()),
            scans: Mutex::new(0),
            stop_scans: Mutex::new(0),
            snapshots: Mutex::new(VecDeque::new()),
            last_snapshot: Mutex::new(None),
        }
    }

    /// Queue a raw payload for the next snapshot.
    pub fn push_snapshot(&self, raw: &str) {
        self.snapshots.lock().push_back(Some(raw.as_bytes().to_vec()));
    }

    /// Queue a missing payload for the next snapshot.
    pub fn push_no_snapshot(&self) {
        self.snapshots.lock().push_back(None);
    }

    pub fn frames(&self) -> Vec<SentFrame> {
        self.frames.lock().clone()
    }

    pub fn frames_for(&self, position: &str) -> Vec<SentFrame> {
        self.frames
            .lock()
            .iter()
            .filter(|f| f.position == position)
            .cloned()
            .collect()
    }

    pub fn clear_frames(&self) {
        self.frames.lock().clear();
    }
}

impl ActuationSink for RecordingDriver {
    fn set_motors(&self, position: &str, frame: &MotorFrame) {
        self.frames.lock().push(SentFrame {
            at: self.clock.now(),
            position: position.to_string(),
            frame: *frame,
        });
    }

    fn stop_all(&self) {
        self.stop_all_at.lock().push(self.clock.now());
    }
}

impl DiscoverySource for RecordingDriver {
    fn scan(&self) {
        *self.scans.lock() += 1;
    }

    fn stop_scan(&self) {
        *self.stop_scans.lock() += 1;
    }

    fn snapshot(&self) -> Option<Vec<u8>> {
        match self.snapshots.lock().pop_front() {
            Some(next) => {
                if next.is_some() {
                    *self.last_snapshot.lock() = next.clone();
                }
                next
            }
            None => self.last_snapshot.lock().clone(),
        }
    }

    fn pair(&self, id: &str) {
        self.pairs.lock().push(id.to_string());
    }

    fn unpair(&self, id: &str) {
        self.unpairs.lock().push(id.to_string());
    }
}

impl GloveDriver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn version(&self) -> &'static str {
        "test"
    }
}

/// Engine on a manual clock with a seeded random source.
pub struct Rig {
    pub engine: GloveEngine,
    pub driver: Arc<RecordingDriver>,
    pub clock: ManualClock,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(GloveConfig::with_service_name("test-rig"))
    }

    pub fn with_config(config: GloveConfig) -> Self {
        let clock = ManualClock::new();
        let driver = Arc::new(RecordingDriver::new(clock.clone()));
        let engine = GloveEngine::new(&config, driver.clone())
            .expect("engine")
            .with_clock(Arc::new(clock.clone()))
            .with_rng(StdRng::seed_from_u64(42));
        Self {
            engine,
            driver,
            clock,
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Advance to `until`, firing every due event at its own deadline.
    pub fn run_until(&mut self, until: Duration) {
        while let Some(deadline) = self.engine.next_deadline() {
            if deadline > until {
                break;
            }
            self.clock.set(deadline);
            self.engine.run_due();
        }
        self.clock.set(until);
        self.engine.run_due();
    }

    /// Advance by `delta` from the current time.
    pub fn advance(&mut self, delta: Duration) {
        let until = self.now() + delta;
        self.run_until(until);
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

pub fn secs(v: u64) -> Duration {
    Duration::from_secs(v)
}

pub const TWO_GLOVES: &str = r#"[
    {"id":"left-1","name":"TactGlove (L)","position":"GloveL","isConnected":false,"isPaired":false},
    {"id":"right-1","name":"TactGlove (R)","position":"GloveR","isConnected":false,"isPaired":false},
    {"id":"vest-1","name":"TactSuit","position":"Vest","isConnected":true}
]"#;
