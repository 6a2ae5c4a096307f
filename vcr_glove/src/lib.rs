//! # vCR Glove Library
//!
//! Stimulation scheduling engine and device-state reconciler for a pair of
//! haptic gloves running vibrotactile coordinated reset (vCR) and simple
//! buzz patterns.
//!
//! # Module Structure
//!
//! - [`engine`] - `GloveEngine`, the single context object owning all state
//! - [`service`] - Tokio task wrapper and async handle around the engine
//! - [`scheduler`] - Per-position tasks, countdowns and tick dispatch
//! - [`sequencer`] - Randomized, staggered burst planning for vCR cycles
//! - [`reconciler`] - Snapshot parsing and optimistic pairing overlay
//! - [`timers`] - Deadline-ordered timer queue
//! - [`audit`] - Tagged audit log with JSONL export
//! - [`drivers`] - Driver implementations (simulation)
//! - [`error`] - Error types
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        GloveService (tokio task)                   │
//! │   commands ──►┌──────────────────────────────────────────┐         │
//! │   deadlines ─►│               GloveEngine                │         │
//! │               │  ┌────────────┐  ┌──────────────────┐    │         │
//! │               │  │ Reconciler │  │ PatternScheduler │    │         │
//! │               │  └─────▲──────┘  └───────┬──────────┘    │         │
//! │               │        │ snapshots       │ frames        │         │
//! │               │  ┌─────┴──────┐  ┌───────▼──────────┐    │         │
//! │               │  │ Discovery  │  │  ActuationSink   │    │         │
//! │               │  └────────────┘  └──────────────────┘    │         │
//! │               └──────────────────────────────────────────┘         │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod scheduler;
pub mod sequencer;
pub mod service;
pub mod timers;

// Re-export key types for convenience
pub use crate::engine::GloveEngine;
pub use crate::error::{GloveError, GloveResult};
pub use crate::service::{GloveHandle, GloveService, PositionStatus, TokioClock};
