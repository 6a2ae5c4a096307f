//! The glove control engine.
//!
//! `GloveEngine` is the single context object that owns every piece of
//! mutable state: the displayed device list and its overlay, the pattern
//! task table, the timer queue and the audit log. All operations take
//! `&mut self`, so nothing interleaves. The engine never sleeps: anything
//! that should happen later is a [`TimerEvent`] in the queue, and whoever
//! drives the engine calls [`GloveEngine::run_due`] once the clock passes
//! [`GloveEngine::next_deadline`].

use crate::audit::{AuditLog, AuditTag};
use crate::error::GloveResult;
use crate::reconciler::{DeviceReconciler, parse_snapshot};
use crate::scheduler::{PatternScheduler, TaskContext, TaskHandle};
use crate::timers::{TimerEvent, TimerQueue};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vcr::clock::{Clock, MonotonicClock};
use vcr::config::{DiscoveryConfig, GloveConfig, StimulationConfig};
use vcr::consts::MAX_AMPLITUDE;
use vcr::device::Device;
use vcr::driver::{ActuationSink, DiscoverySource, GloveDriver};
use vcr::pattern::{PatternKind, PatternSpec, VcrParams, uniform_frame};

/// Deterministic controller for up to two haptic gloves.
pub struct GloveEngine {
    discovery_config: DiscoveryConfig,
    stimulation: StimulationConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ActuationSink>,
    discovery: Arc<dyn DiscoverySource>,
    rng: Box<dyn RngCore + Send>,
    timers: TimerQueue,
    reconciler: DeviceReconciler,
    scheduler: PatternScheduler,
    audit: AuditLog,
    devices: Vec<Device>,
    scanning: bool,
    scan_generation: u64,
}

impl GloveEngine {
    /// Engine driving a single driver for both output and discovery.
    ///
    /// # Errors
    /// See [`GloveEngine::from_parts`].
    pub fn new<D: GloveDriver + 'static>(config: &GloveConfig, driver: Arc<D>) -> GloveResult<Self> {
        info!("Using driver {} v{}", driver.name(), driver.version());
        let sink: Arc<dyn ActuationSink> = driver.clone();
        let discovery: Arc<dyn DiscoverySource> = driver;
        Self::from_parts(config, sink, discovery)
    }

    /// Engine over separate output and discovery halves.
    ///
    /// # Errors
    /// Fails when the configuration does not validate or the configured
    /// audit export cannot be opened.
    pub fn from_parts(
        config: &GloveConfig,
        sink: Arc<dyn ActuationSink>,
        discovery: Arc<dyn DiscoverySource>,
    ) -> GloveResult<Self> {
        config.validate()?;
        let mut audit = AuditLog::new(config.audit.capacity);
        if let Some(path) = &config.audit.jsonl_path {
            audit = audit.with_jsonl(path)?;
        }
        Ok(Self {
            discovery_config: config.discovery.clone(),
            stimulation: config.stimulation.clone(),
            clock: Arc::new(MonotonicClock::new()),
            sink,
            discovery,
            rng: Box::new(StdRng::from_entropy()),
            timers: TimerQueue::new(),
            reconciler: DeviceReconciler::new(),
            scheduler: PatternScheduler::new(),
            audit,
            devices: Vec::new(),
            scanning: false,
            scan_generation: 0,
        })
    }

    /// Replace the time source. Call before scheduling anything.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the random source used for burst ordering.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Current engine time.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    fn split(&mut self) -> (&mut PatternScheduler, TaskContext<'_>) {
        let ctx = TaskContext {
            now: self.clock.now(),
            timers: &mut self.timers,
            sink: &*self.sink,
            audit: &mut self.audit,
            rng: &mut *self.rng,
        };
        (&mut self.scheduler, ctx)
    }

    fn record(&mut self, tag: AuditTag, position: Option<&str>, message: impl Into<String>) {
        let now = self.clock.now();
        self.audit.record(now, tag, position, message);
    }

    fn schedule_after(&mut self, delay: Duration, event: TimerEvent) {
        let deadline = self.clock.now() + delay;
        self.timers.schedule(deadline, event);
    }

    // ─── Discovery ──────────────────────────────────────────────────

    /// Begin scanning and polling for devices.
    pub fn start_scan(&mut self) {
        if self.scanning {
            return;
        }
        self.discovery.scan();
        self.scanning = true;
        self.scan_generation += 1;
        info!("Scanning for gloves");
        self.record(AuditTag::Scan, None, "Scanning...");
        self.schedule_after(
            self.discovery_config.poll_interval(),
            TimerEvent::Poll {
                generation: self.scan_generation,
            },
        );
    }

    /// Stop scanning, cancel polling and refresh once.
    pub fn stop_scan(&mut self) {
        if !self.scanning {
            return;
        }
        self.discovery.stop_scan();
        self.scanning = false;
        self.scan_generation += 1;
        info!("Scan stopped");
        self.record(AuditTag::Scan, None, "Scan stopped");
        self.refresh_devices();
    }

    /// Whether a scan is in progress.
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Pull a snapshot and rebuild the displayed list.
    ///
    /// Returns `true` when the list changed. A missing snapshot is ignored
    /// and a malformed one keeps the current list.
    pub fn refresh_devices(&mut self) -> bool {
        let Some(raw) = self.discovery.snapshot() else {
            return false;
        };
        let Some(snapshot) = parse_snapshot(&raw) else {
            warn!("Ignoring malformed device snapshot ({} bytes)", raw.len());
            return false;
        };

        let devices = self.reconciler.reconcile_devices(snapshot);
        if devices == self.devices {
            return false;
        }
        let summary = devices
            .iter()
            .map(|d| format!("{}{}", d.pretty_name(), if d.is_connected() { "*" } else { "" }))
            .collect::<Vec<_>>()
            .join(", ");
        debug!("Device list: [{summary}]");
        self.record(
            AuditTag::Devices,
            None,
            format!("{} glove(s): {summary}", devices.len()),
        );
        self.devices = devices;
        true
    }

    /// Displayed devices, sorted by position.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Displayed device with the given id.
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    fn reapply_overlay(&mut self) {
        let current = std::mem::take(&mut self.devices);
        self.devices = self.reconciler.reconcile_devices(current);
    }

    // ─── Pairing ────────────────────────────────────────────────────

    /// Request pairing. The device shows as connected immediately; a
    /// refresh and a confirmation buzz follow after the pair delay.
    pub fn pair(&mut self, id: &str) {
        self.discovery.pair(id);
        self.reconciler.request_pair(id);

        let (label, position) = self.describe(id);
        info!("Pairing {label}");
        self.record(AuditTag::Pair, position.as_deref(), format!("Pairing {label}"));
        self.reapply_overlay();

        self.schedule_after(
            self.discovery_config.pair_refresh_delay(),
            TimerEvent::PairFollowUp {
                id: id.to_string(),
                position,
            },
        );
    }

    /// Unpair one device and stop its stimulation.
    pub fn disconnect(&mut self, id: &str) {
        self.discovery.unpair(id);
        let (label, position) = self.describe(id);
        if let Some(position) = &position {
            self.stop_pattern(position);
        }
        self.reconciler.request_disconnect(id);
        info!("Disconnecting {label}");
        self.record(
            AuditTag::Disconnect,
            position.as_deref(),
            format!("Disconnecting {label}"),
        );
        self.reapply_overlay();
        self.schedule_after(
            self.discovery_config.disconnect_refresh_delay(),
            TimerEvent::Refresh,
        );
    }

    /// Unpair every displayed device and silence all output.
    pub fn disconnect_all(&mut self) {
        let targets: Vec<(String, String)> = self
            .devices
            .iter()
            .map(|d| (d.id.clone(), d.position_tag().to_string()))
            .collect();
        for (id, position) in &targets {
            self.discovery.unpair(id);
            self.stop_pattern(position);
            self.reconciler.request_disconnect(id);
        }
        self.sink.stop_all();
        info!("Disconnect all requested ({} device(s))", targets.len());
        self.record(AuditTag::Disconnect, None, "Disconnect all requested");
        self.reapply_overlay();
        self.schedule_after(
            self.discovery_config.disconnect_all_refresh_delay(),
            TimerEvent::Refresh,
        );
    }

    fn describe(&self, id: &str) -> (String, Option<String>) {
        match self.device(id) {
            Some(device) => (device.pretty_name().to_string(), device.position.clone()),
            None => (id.to_string(), None),
        }
    }

    // ─── Stimulation ────────────────────────────────────────────────

    /// One-shot all-motors buzz at `position`.
    pub fn vibrate(&mut self, position: &str, amplitude: u8) {
        let amplitude = amplitude.min(MAX_AMPLITUDE);
        self.sink.set_motors(position, &uniform_frame(amplitude));
        self.record(
            AuditTag::Buzz,
            Some(position),
            format!("Buzz @ {position} ({amplitude})"),
        );
    }

    /// Start `spec` at `position`, replacing any running task.
    pub fn start_pattern(&mut self, position: &str, spec: PatternSpec) -> TaskHandle {
        let (scheduler, mut ctx) = self.split();
        scheduler.start(position, spec, &mut ctx)
    }

    /// Stop the task at `position`. Returns whether one was running.
    pub fn stop_pattern(&mut self, position: &str) -> bool {
        let (scheduler, mut ctx) = self.split();
        scheduler.stop(position, &mut ctx)
    }

    /// Start when idle, stop when running.
    pub fn toggle_pattern(&mut self, position: &str, spec: PatternSpec) -> Option<TaskHandle> {
        let (scheduler, mut ctx) = self.split();
        scheduler.toggle(position, spec, &mut ctx)
    }

    /// Toggle the long buzz preset for `kind`, using the configured length.
    pub fn toggle_long_buzz(&mut self, position: &str, kind: PatternKind) -> Option<TaskHandle> {
        let spec = PatternSpec::long_buzz(kind)
            .with_total_seconds(Some(self.stimulation.long_buzz_seconds));
        self.toggle_pattern(position, spec)
    }

    /// Start a vCR session from raw parameters clamped into the configured
    /// limits.
    pub fn start_vcr(&mut self, position: &str, params: &VcrParams, total_seconds: Option<u64>) -> TaskHandle {
        let spec = params
            .clamped(&self.stimulation.limits)
            .with_total_seconds(total_seconds);
        self.start_pattern(position, spec)
    }

    /// Start a vCR session with the configured default parameters.
    pub fn start_default_vcr(&mut self, position: &str, total_seconds: Option<u64>) -> TaskHandle {
        let params = self.stimulation.vcr;
        self.start_vcr(position, &params, total_seconds)
    }

    /// Whether a task is running at `position`.
    pub fn is_active(&self, position: &str) -> bool {
        self.scheduler.is_active(position)
    }

    /// Whole seconds left at `position`.
    pub fn remaining(&self, position: &str) -> Option<u64> {
        self.scheduler.remaining(position, self.clock.now())
    }

    /// Every countdown, sorted by position.
    pub fn countdowns(&self) -> Vec<(String, u64)> {
        self.scheduler.countdowns(self.clock.now())
    }

    /// Parameters of the task at `position`.
    pub fn pattern(&self, position: &str) -> Option<PatternSpec> {
        self.scheduler.spec(position)
    }

    /// Audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ─── Driving ────────────────────────────────────────────────────

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Number of pending timer events.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Fire every event due at the current time, in deadline order.
    ///
    /// Returns the number of events handled. Events scheduled while running
    /// that are already due are handled in the same call.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some((deadline, event)) = self.timers.pop_due(now) {
            self.dispatch(deadline, event);
            fired += 1;
        }
        fired
    }

    fn dispatch(&mut self, deadline: Duration, event: TimerEvent) {
        match event {
            TimerEvent::CycleTick { handle } => {
                let (scheduler, mut ctx) = self.split();
                scheduler.on_tick(&handle, deadline, &mut ctx);
            }
            TimerEvent::Expire { handle } => {
                let (scheduler, mut ctx) = self.split();
                scheduler.on_expire(&handle, &mut ctx);
            }
            TimerEvent::BurstOn {
                handle,
                motor,
                amplitude,
            } => {
                let (scheduler, mut ctx) = self.split();
                scheduler.on_burst_on(&handle, motor, amplitude, &mut ctx);
            }
            TimerEvent::BurstOff { position } => {
                let (scheduler, mut ctx) = self.split();
                scheduler.on_burst_off(&position, &mut ctx);
            }
            TimerEvent::Poll { generation } => {
                if !self.scanning || generation != self.scan_generation {
                    return;
                }
                self.refresh_devices();
                self.schedule_after(
                    self.discovery_config.poll_interval(),
                    TimerEvent::Poll { generation },
                );
            }
            TimerEvent::Refresh => {
                self.refresh_devices();
            }
            TimerEvent::PairFollowUp { id, position } => {
                self.refresh_devices();
                let position = self
                    .device(&id)
                    .and_then(|d| d.position.clone())
                    .or(position);
                let amplitude = self.discovery_config.auto_buzz_amplitude;
                match position {
                    _ if amplitude == 0 => {}
                    Some(position) => self.vibrate(&position, amplitude),
                    None => debug!("No position known for {id}; skipping confirmation buzz"),
                }
            }
        }
    }

    /// Stop every task, silence all output and end any scan.
    pub fn shutdown(&mut self) {
        for position in self.scheduler.active_positions() {
            self.stop_pattern(&position);
        }
        if self.scanning {
            self.discovery.stop_scan();
            self.scanning = false;
            self.scan_generation += 1;
        }
        self.sink.stop_all();
        info!("Glove engine shut down");
    }
}
