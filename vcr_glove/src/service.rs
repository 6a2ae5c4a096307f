//! Async front end for [`GloveEngine`].
//!
//! The engine is moved into one tokio task. That task alternates between
//! commands arriving on a channel and sleeping until the engine's next timer
//! deadline, so API calls and timer callbacks never overlap. Callers talk to
//! it through a cloneable [`GloveHandle`]; every request carries a oneshot
//! reply.

use crate::audit::AuditEntry;
use crate::engine::GloveEngine;
use crate::error::{GloveError, GloveResult};
use crate::scheduler::TaskHandle;
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use vcr::clock::Clock;
use vcr::device::Device;
use vcr::pattern::{PatternKind, PatternSpec, VcrParams};

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Clock on tokio's time source; follows a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Instant of the given engine time.
    pub fn instant_at(&self, at: Duration) -> Instant {
        self.origin + at
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Stimulation state of one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionStatus {
    /// A task is running.
    pub active: bool,
    /// Whole seconds left, if timed.
    pub remaining: Option<u64>,
    /// Parameters of the running task.
    pub pattern: Option<PatternSpec>,
}

enum GloveCommand {
    StartScan {
        reply: oneshot::Sender<()>,
    },
    StopScan {
        reply: oneshot::Sender<()>,
    },
    Devices {
        reply: oneshot::Sender<Vec<Device>>,
    },
    Pair {
        id: String,
        reply: oneshot::Sender<()>,
    },
    Disconnect {
        id: String,
        reply: oneshot::Sender<()>,
    },
    DisconnectAll {
        reply: oneshot::Sender<()>,
    },
    Vibrate {
        position: String,
        amplitude: u8,
        reply: oneshot::Sender<()>,
    },
    StartPattern {
        position: String,
        spec: PatternSpec,
        reply: oneshot::Sender<TaskHandle>,
    },
    StartVcr {
        position: String,
        params: VcrParams,
        total_seconds: Option<u64>,
        reply: oneshot::Sender<TaskHandle>,
    },
    ToggleLongBuzz {
        position: String,
        kind: PatternKind,
        reply: oneshot::Sender<Option<TaskHandle>>,
    },
    StopPattern {
        position: String,
        reply: oneshot::Sender<bool>,
    },
    Status {
        position: String,
        reply: oneshot::Sender<PositionStatus>,
    },
    AuditTail {
        count: usize,
        reply: oneshot::Sender<Vec<AuditEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Runs a [`GloveEngine`] on its own task.
pub struct GloveService;

impl GloveService {
    /// Move a freshly built engine onto a new task.
    ///
    /// The engine's clock is replaced with a [`TokioClock`], so nothing may
    /// have been scheduled on it yet.
    pub fn spawn(engine: GloveEngine) -> (GloveHandle, JoinHandle<()>) {
        let clock = TokioClock::new();
        let engine = engine.with_clock(Arc::new(clock));
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let task = tokio::spawn(run(engine, clock, rx));
        (GloveHandle { tx }, task)
    }
}

async fn run(mut engine: GloveEngine, clock: TokioClock, mut rx: mpsc::Receiver<GloveCommand>) {
    info!("Glove service started");
    loop {
        let wake = engine.next_deadline().map(|at| clock.instant_at(at));
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => {
                    // Due timers first so the reply sees current state.
                    engine.run_due();
                    if handle(&mut engine, command).is_break() {
                        break;
                    }
                }
                None => {
                    debug!("All glove handles dropped");
                    engine.shutdown();
                    break;
                }
            },
            () = sleep_until(wake) => {
                engine.run_due();
            }
        }
    }
    info!("Glove service stopped");
}

async fn sleep_until(wake: Option<Instant>) {
    match wake {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn handle(engine: &mut GloveEngine, command: GloveCommand) -> ControlFlow<()> {
    // A dropped reply receiver only means the caller stopped waiting.
    match command {
        GloveCommand::StartScan { reply } => {
            engine.start_scan();
            let _ = reply.send(());
        }
        GloveCommand::StopScan { reply } => {
            engine.stop_scan();
            let _ = reply.send(());
        }
        GloveCommand::Devices { reply } => {
            let _ = reply.send(engine.devices().to_vec());
        }
        GloveCommand::Pair { id, reply } => {
            engine.pair(&id);
            let _ = reply.send(());
        }
        GloveCommand::Disconnect { id, reply } => {
            engine.disconnect(&id);
            let _ = reply.send(());
        }
        GloveCommand::DisconnectAll { reply } => {
            engine.disconnect_all();
            let _ = reply.send(());
        }
        GloveCommand::Vibrate {
            position,
            amplitude,
            reply,
        } => {
            engine.vibrate(&position, amplitude);
            let _ = reply.send(());
        }
        GloveCommand::StartPattern {
            position,
            spec,
            reply,
        } => {
            let _ = reply.send(engine.start_pattern(&position, spec));
        }
        GloveCommand::StartVcr {
            position,
            params,
            total_seconds,
            reply,
        } => {
            let _ = reply.send(engine.start_vcr(&position, &params, total_seconds));
        }
        GloveCommand::ToggleLongBuzz {
            position,
            kind,
            reply,
        } => {
            let _ = reply.send(engine.toggle_long_buzz(&position, kind));
        }
        GloveCommand::StopPattern { position, reply } => {
            let _ = reply.send(engine.stop_pattern(&position));
        }
        GloveCommand::Status { position, reply } => {
            let _ = reply.send(PositionStatus {
                active: engine.is_active(&position),
                remaining: engine.remaining(&position),
                pattern: engine.pattern(&position),
            });
        }
        GloveCommand::AuditTail { count, reply } => {
            let _ = reply.send(engine.audit().tail(count));
        }
        GloveCommand::Shutdown { reply } => {
            engine.shutdown();
            let _ = reply.send(());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

/// Cloneable client of a running [`GloveService`].
#[derive(Clone)]
pub struct GloveHandle {
    tx: mpsc::Sender<GloveCommand>,
}

impl GloveHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> GloveCommand) -> GloveResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| GloveError::ServiceStopped)?;
        response.await.map_err(|_| GloveError::ServiceStopped)
    }

    /// Begin scanning and polling.
    pub async fn start_scan(&self) -> GloveResult<()> {
        self.request(|reply| GloveCommand::StartScan { reply }).await
    }

    /// Stop scanning and refresh once.
    pub async fn stop_scan(&self) -> GloveResult<()> {
        self.request(|reply| GloveCommand::StopScan { reply }).await
    }

    /// Currently displayed devices.
    pub async fn devices(&self) -> GloveResult<Vec<Device>> {
        self.request(|reply| GloveCommand::Devices { reply }).await
    }

    /// Request pairing of `id`.
    pub async fn pair(&self, id: impl Into<String>) -> GloveResult<()> {
        let id = id.into();
        self.request(|reply| GloveCommand::Pair { id, reply }).await
    }

    /// Unpair `id` and stop its stimulation.
    pub async fn disconnect(&self, id: impl Into<String>) -> GloveResult<()> {
        let id = id.into();
        self.request(|reply| GloveCommand::Disconnect { id, reply }).await
    }

    /// Unpair everything and silence all output.
    pub async fn disconnect_all(&self) -> GloveResult<()> {
        self.request(|reply| GloveCommand::DisconnectAll { reply }).await
    }

    /// One-shot all-motors buzz.
    pub async fn vibrate(&self, position: impl Into<String>, amplitude: u8) -> GloveResult<()> {
        let position = position.into();
        self.request(|reply| GloveCommand::Vibrate {
            position,
            amplitude,
            reply,
        })
        .await
    }

    /// Start `spec` at `position`.
    pub async fn start_pattern(&self, position: impl Into<String>, spec: PatternSpec) -> GloveResult<TaskHandle> {
        let position = position.into();
        self.request(|reply| GloveCommand::StartPattern {
            position,
            spec,
            reply,
        })
        .await
    }

    /// Start a vCR session from raw, clamped parameters.
    pub async fn start_vcr(
        &self,
        position: impl Into<String>,
        params: VcrParams,
        total_seconds: Option<u64>,
    ) -> GloveResult<TaskHandle> {
        let position = position.into();
        self.request(|reply| GloveCommand::StartVcr {
            position,
            params,
            total_seconds,
            reply,
        })
        .await
    }

    /// Toggle a long buzz preset.
    pub async fn toggle_long_buzz(&self, position: impl Into<String>, kind: PatternKind) -> GloveResult<Option<TaskHandle>> {
        let position = position.into();
        self.request(|reply| GloveCommand::ToggleLongBuzz {
            position,
            kind,
            reply,
        })
        .await
    }

    /// Stop the task at `position`.
    pub async fn stop_pattern(&self, position: impl Into<String>) -> GloveResult<bool> {
        let position = position.into();
        self.request(|reply| GloveCommand::StopPattern { position, reply })
            .await
    }

    /// Stimulation state of `position`.
    pub async fn status(&self, position: impl Into<String>) -> GloveResult<PositionStatus> {
        let position = position.into();
        self.request(|reply| GloveCommand::Status { position, reply })
            .await
    }

    /// The newest `count` audit entries.
    pub async fn audit_tail(&self, count: usize) -> GloveResult<Vec<AuditEntry>> {
        self.request(|reply| GloveCommand::AuditTail { count, reply })
            .await
    }

    /// Stop everything and end the service task.
    pub async fn shutdown(&self) -> GloveResult<()> {
        self.request(|reply| GloveCommand::Shutdown { reply }).await
    }
}
