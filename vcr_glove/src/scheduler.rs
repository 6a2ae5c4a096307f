//! Per-position stimulation tasks.
//!
//! At most one task runs per glove position. A task is a repeating cycle
//! trigger plus an optional countdown; each trigger re-evaluates the
//! countdown and then dispatches the pattern's frame (or a burst cycle).
//! A timed task also arms an expiry at `started_at + total`, so it goes
//! idle at that instant even when no tick lands on it.
//!
//! Cancellation is generation based: every `start` mints a fresh generation
//! and `stop` removes the table entry, so any tick or burst still queued for
//! an older generation finds nothing to act on and is dropped.

use crate::audit::{AuditLog, AuditTag};
use crate::sequencer::BurstSequencer;
use crate::timers::{TimerEvent, TimerQueue, next_periodic_deadline};
use rand::RngCore;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};
use vcr::consts::INTERMITTENT_PERIOD_S;
use vcr::driver::ActuationSink;
use vcr::pattern::{ALL_OFF, MotorFrame, PatternKind, PatternSpec, single_motor_frame, uniform_frame};

/// Identity of one started task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    /// Glove position the task drives.
    pub position: String,
    /// Start counter value; unique per `start`.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTask {
    spec: PatternSpec,
    started_at: Duration,
    generation: u64,
    interval: Duration,
}

impl ActiveTask {
    fn elapsed_secs(&self, now: Duration) -> u64 {
        now.saturating_sub(self.started_at).as_secs()
    }

    fn remaining(&self, now: Duration) -> Option<u64> {
        self.spec
            .total_seconds
            .map(|total| total.saturating_sub(self.elapsed_secs(now)))
    }
}

/// What a single tick of a non-burst pattern does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Send this frame to the position.
    Frame(MotorFrame),
    /// Send nothing this tick.
    Silent,
    /// Run a cyclic-burst cycle.
    Bursts,
}

/// Tick body as a pure function of the task parameters and elapsed time.
pub fn plan_tick(spec: &PatternSpec, elapsed_secs: u64) -> TickAction {
    match spec.kind {
        PatternKind::Constant => TickAction::Frame(uniform_frame(spec.amplitude)),
        PatternKind::Pulse if elapsed_secs % 2 == 0 => {
            TickAction::Frame(uniform_frame(spec.amplitude))
        }
        PatternKind::Pulse => TickAction::Frame(ALL_OFF),
        PatternKind::Intermittent if elapsed_secs % INTERMITTENT_PERIOD_S == 0 => {
            TickAction::Frame(uniform_frame(spec.amplitude))
        }
        PatternKind::Intermittent => TickAction::Silent,
        PatternKind::CyclicBurst => TickAction::Bursts,
    }
}

/// Engine state borrowed by the scheduler for one operation.
pub struct TaskContext<'a> {
    /// Current engine time.
    pub now: Duration,
    /// Queue receiving follow-up ticks and bursts.
    pub timers: &'a mut TimerQueue,
    /// Motor output.
    pub sink: &'a dyn ActuationSink,
    /// Lifecycle log.
    pub audit: &'a mut AuditLog,
    /// Random source for burst ordering.
    pub rng: &'a mut (dyn RngCore + Send),
}

/// Table of running tasks and their countdowns.
#[derive(Debug, Default)]
pub struct PatternScheduler {
    tasks: HashMap<String, ActiveTask>,
    stopped: HashMap<String, u64>,
    next_generation: u64,
    sequencer: BurstSequencer,
}

impl PatternScheduler {
    /// Empty scheduler using the standard burst stagger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with a custom burst sequencer.
    pub fn with_sequencer(sequencer: BurstSequencer) -> Self {
        Self {
            sequencer,
            ..Self::default()
        }
    }

    /// Start `spec` at `position`, replacing any running task there.
    pub fn start(&mut self, position: &str, spec: PatternSpec, ctx: &mut TaskContext<'_>) -> TaskHandle {
        self.stop(position, ctx);

        self.next_generation += 1;
        let task = ActiveTask {
            spec,
            started_at: ctx.now,
            generation: self.next_generation,
            interval: spec.cycle_interval(),
        };
        let handle = TaskHandle {
            position: position.to_string(),
            generation: task.generation,
        };

        self.stopped.remove(position);
        self.tasks.insert(position.to_string(), task);
        ctx.timers.schedule(
            ctx.now + task.interval,
            TimerEvent::CycleTick {
                handle: handle.clone(),
            },
        );
        if let Some(total) = spec.total_seconds {
            ctx.timers.schedule(
                ctx.now + Duration::from_secs(total),
                TimerEvent::Expire {
                    handle: handle.clone(),
                },
            );
        }

        let detail = match spec.total_seconds {
            Some(total) => format!("Started {} @ {position} for {total}s", spec.kind),
            None => format!("Started {} @ {position}", spec.kind),
        };
        info!(
            "{detail} (amplitude {}, every {:?})",
            spec.amplitude, task.interval
        );
        ctx.audit.record(ctx.now, AuditTag::Start, Some(position), detail);
        handle
    }

    /// Stop the task at `position`.
    ///
    /// Returns `false` and emits nothing when no task is running there.
    pub fn stop(&mut self, position: &str, ctx: &mut TaskContext<'_>) -> bool {
        let Some(task) = self.tasks.remove(position) else {
            return false;
        };
        self.stopped.insert(position.to_string(), 0);
        ctx.sink.set_motors(position, &ALL_OFF);

        let elapsed = task.elapsed_secs(ctx.now);
        let message = format!(
            "Stopped {} @ {position} after {}m {}s",
            task.spec.kind,
            elapsed / 60,
            elapsed % 60
        );
        info!("{message}");
        ctx.audit.record(ctx.now, AuditTag::Stop, Some(position), message);
        true
    }

    /// Start when idle, stop when running. Returns the new handle on start.
    pub fn toggle(&mut self, position: &str, spec: PatternSpec, ctx: &mut TaskContext<'_>) -> Option<TaskHandle> {
        if self.stop(position, ctx) {
            None
        } else {
            Some(self.start(position, spec, ctx))
        }
    }

    /// Whether a task is running at `position`.
    pub fn is_active(&self, position: &str) -> bool {
        self.tasks.contains_key(position)
    }

    /// Whether `handle` still names the running task.
    pub fn is_current(&self, handle: &TaskHandle) -> bool {
        self.tasks
            .get(&handle.position)
            .is_some_and(|task| task.generation == handle.generation)
    }

    /// Parameters of the running task at `position`.
    pub fn spec(&self, position: &str) -> Option<PatternSpec> {
        self.tasks.get(position).map(|task| task.spec)
    }

    /// Whole seconds left at `position`.
    ///
    /// `None` for untimed or never-started tasks, `Some(0)` after a stop.
    pub fn remaining(&self, position: &str, now: Duration) -> Option<u64> {
        match self.tasks.get(position) {
            Some(task) => task.remaining(now),
            None => self.stopped.get(position).copied(),
        }
    }

    /// Countdown of every position that has one, sorted by position.
    pub fn countdowns(&self, now: Duration) -> Vec<(String, u64)> {
        let running = self
            .tasks
            .iter()
            .filter_map(|(position, task)| Some((position.clone(), task.remaining(now)?)));
        let stopped = self
            .stopped
            .iter()
            .map(|(position, remaining)| (position.clone(), *remaining));
        let mut all: Vec<_> = running.chain(stopped).collect();
        all.sort();
        all
    }

    /// Positions with a running task, sorted.
    pub fn active_positions(&self) -> Vec<String> {
        let mut positions: Vec<_> = self.tasks.keys().cloned().collect();
        positions.sort();
        positions
    }

    /// Handle a cycle trigger that was due at `deadline`.
    pub fn on_tick(&mut self, handle: &TaskHandle, deadline: Duration, ctx: &mut TaskContext<'_>) {
        let Some(task) = self.tasks.get(&handle.position).copied() else {
            debug!("Dropping tick for idle position {}", handle.position);
            return;
        };
        if task.generation != handle.generation {
            debug!(
                "Dropping stale tick for {} (generation {} != {})",
                handle.position, handle.generation, task.generation
            );
            return;
        }

        let elapsed = task.elapsed_secs(ctx.now);
        if task.remaining(ctx.now) == Some(0) {
            self.stop(&handle.position, ctx);
            return;
        }

        ctx.timers.schedule(
            next_periodic_deadline(deadline, task.interval, ctx.now),
            TimerEvent::CycleTick {
                handle: handle.clone(),
            },
        );

        let position = handle.position.as_str();
        match plan_tick(&task.spec, elapsed) {
            TickAction::Frame(frame) => ctx.sink.set_motors(position, &frame),
            TickAction::Silent => {}
            TickAction::Bursts => self.dispatch_bursts(handle, &task.spec, ctx),
        }

        ctx.audit.record(
            ctx.now,
            AuditTag::Cycle,
            Some(position),
            format!("{} tick @ {position} ({elapsed}s)", task.spec.kind),
        );
    }

    /// Stop a timed task whose countdown has run out.
    pub fn on_expire(&mut self, handle: &TaskHandle, ctx: &mut TaskContext<'_>) {
        if !self.is_current(handle) {
            debug!("Dropping stale expiry for {}", handle.position);
            return;
        }
        self.stop(&handle.position, ctx);
    }

    fn dispatch_bursts(&self, handle: &TaskHandle, spec: &PatternSpec, ctx: &mut TaskContext<'_>) {
        let plan = self
            .sequencer
            .plan_cycle(spec.amplitude, spec.burst_ms, spec.motors, &mut *ctx.rng);
        for command in &plan {
            ctx.timers.schedule(
                ctx.now + command.on_offset,
                TimerEvent::BurstOn {
                    handle: handle.clone(),
                    motor: command.motor,
                    amplitude: command.amplitude,
                },
            );
            ctx.timers.schedule(
                ctx.now + command.off_offset(),
                TimerEvent::BurstOff {
                    position: handle.position.clone(),
                },
            );
        }
    }

    /// Fire one staggered activation unless its task has gone.
    pub fn on_burst_on(&self, handle: &TaskHandle, motor: u8, amplitude: u8, ctx: &mut TaskContext<'_>) {
        if !self.is_current(handle) {
            debug!("Dropping burst for stopped task @ {}", handle.position);
            return;
        }
        ctx.sink
            .set_motors(&handle.position, &single_motor_frame(motor, amplitude));
    }

    /// End a burst. Always emitted, even for a stopped task.
    pub fn on_burst_off(&self, position: &str, ctx: &mut TaskContext<'_>) {
        ctx.sink.set_motors(position, &ALL_OFF);
    }
}
