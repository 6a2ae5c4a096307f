//! Glove driver implementations.
//!
//! - [`simulation`] - Software gloves for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `ActuationSink`, `DiscoverySource` and `GloveDriver` from
//!    `vcr_common::driver`
//! 3. Hand an `Arc` of it to `GloveEngine::new`

pub mod simulation;

pub use simulation::SimulatedGloves;
