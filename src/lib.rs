//! # wavewatch
//!
//! A coastal wave monitoring and escalation engine. It watches a
//! camera-derived reading stream, classifies each observation on an ordered
//! severity scale, tracks consecutive extreme readings for tsunami
//! escalation, and dispatches deduplicated, cooldown-gated alerts over
//! WhatsApp and SMS. An optional poller folds BMKG earthquake events into
//! the same alert pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  source ──▶ classify ──▶ escalation ──▶ dispatch ──▶ sink    │
//! │  (frames)   (severity)   (decisions)    (channels)  (jsonl)  │
//! │                                            ▲                 │
//! │  poller ──▶ classify ──▶ escalation ───────┘                 │
//! │  (quakes)                (own state)                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: frame transports and the stall-resilient
//!   [`ConnectionManager`]
//! - **[`escalation`]**: the [`EscalationTracker`] turning classified
//!   samples into alert decisions
//! - **[`dispatch`]**: the [`Dispatcher`] fanning alerts out to channel
//!   transports with per-channel isolation
//! - **[`poller`]**: the periodic earthquake feed with its own tracker
//! - **[`session`]**: the stream monitoring loop tying the above together
//! - **[`sink`]**: append-only observation logging
//! - **[`config`]**: layered defaults / file / environment configuration
//!
//! ## Usage
//!
//! ```bash
//! # Monitor a reading feed, config from ./wavewatch.json
//! wavewatch --stream 10.0.0.5:9000
//!
//! # Earthquake polling only
//! wavewatch --poll-only
//! ```
//!
//! Severity classification is pure and reusable on its own:
//!
//! ```
//! use wavewatch::config::MonitorConfig;
//! use wavewatch_types::SeverityLevel;
//!
//! let scale = MonitorConfig::default().wave_scale().unwrap();
//! assert_eq!(scale.classify(150.0), SeverityLevel::Extreme);
//! ```

pub mod config;
pub mod dispatch;
pub mod escalation;
pub mod poller;
pub mod session;
pub mod sink;
pub mod source;

// Re-export main types for convenience
pub use config::{GapPolicy, MonitorConfig};
pub use dispatch::{Dispatcher, MessageTemplates, Transport};
pub use escalation::{EscalationPolicy, EscalationTracker};
pub use poller::{EventFeed, EventPoller};
pub use session::MonitorSession;
pub use sink::{JsonlSink, MemorySink, ObservationSink};
pub use source::{
    ConnectionConfig, ConnectionManager, FrameAnalyzer, FrameReader, FrameTransport,
    NumericLineAnalyzer, ReadOutcome, SourceError, TcpTransport,
};
