//! # wavewatch-types
//!
//! Core types for wave and earthquake alerting. This crate defines the
//! shared schema used by the wavewatch monitoring engine and its adapters:
//! severity levels, classification scales, samples, alert records, and
//! per-channel dispatch results.
//!
//! ## Design Goals
//!
//! - **Dependency-light**: core types work without any serialization framework
//! - **Optional serialization**: enable the `serde` feature as needed
//! - **Source agnostic**: the same record shape describes a video-stream
//!   sample and a polled earthquake event
//! - **Total classification**: every raw value maps to exactly one level
//!
//! ## Example
//!
//! ```rust
//! use wavewatch_types::{ScaleDirection, SeverityLevel, SeverityScale};
//!
//! // Pixel thresholds: a lower peak Y means a higher wave.
//! let scale = SeverityScale::new(
//!     ScaleDirection::Below,
//!     vec![
//!         (180.0, SeverityLevel::Extreme),
//!         (210.0, SeverityLevel::VeryHigh),
//!         (230.0, SeverityLevel::High),
//!         (250.0, SeverityLevel::Medium),
//!         (280.0, SeverityLevel::Low),
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!(scale.classify(150.0), SeverityLevel::Extreme);
//! assert_eq!(scale.classify(300.0), SeverityLevel::Calm);
//! ```

mod channel;
mod record;
mod severity;

pub use channel::*;
pub use record::*;
pub use severity::*;
