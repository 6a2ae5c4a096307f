//! vCR Common Library
//!
//! Shared types and configuration loading utilities for the vCR glove
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Channel widths, timing floors and default cadences
//! - [`device`] - Discovered device model and lenient snapshot decoding
//! - [`pattern`] - Pattern kinds, motor sets/frames and parameter limits
//! - [`driver`] - Actuation sink and discovery source contracts
//! - [`clock`] - Monotonic clock abstraction for drift-robust countdowns
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! vcr = { package = "vcr_common", path = "../vcr_common" }
//! ```
//!
//! Then import:
//! ```rust,ignore
//! use vcr::prelude::*;
//! ```

pub mod clock;
pub mod config;
pub mod consts;
pub mod device;
pub mod driver;
pub mod pattern;
pub mod prelude;
