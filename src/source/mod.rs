//! Frame sources and the connection lifecycle around them.
//!
//! A [`FrameTransport`] knows how to open a connection to a descriptor, a
//! [`FrameReader`] pulls frames off an open connection, and a
//! [`FrameAnalyzer`] reduces a frame to the scalar the classifier consumes.
//! [`ConnectionManager`] wraps the three behind stall detection, bounded
//! reconnection and retry cooldowns.

mod connection;
mod tcp;

pub use connection::{ConnectionConfig, ConnectionManager, ReadOutcome};
pub use tcp::{LineFrameReader, NumericLineAnalyzer, TcpTransport};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to connect to {descriptor}: {reason}")]
    Connect { descriptor: String, reason: String },
    #[error("gave up connecting to {descriptor} after {attempts} attempts")]
    Exhausted { descriptor: String, attempts: u32 },
    #[error("read failed: {0}")]
    Read(String),
}

/// Opens connections to a frame source.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    async fn connect(&self, descriptor: &str) -> Result<Box<dyn FrameReader>, SourceError>;
}

/// Pulls frames off one open connection.
///
/// `Ok(None)` means the connection is alive but produced nothing readable
/// this round; the caller decides when that quiet turns into a stall.
#[async_trait]
pub trait FrameReader: Send {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

impl std::fmt::Debug for dyn FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FrameReader")
    }
}

/// Reduces a frame payload to the classifiable scalar.
///
/// `None` means the frame held no usable reading (an undetectable frame);
/// the gap policy decides what happens to it.
pub trait FrameAnalyzer: Send {
    fn raw_value(&self, frame: &[u8]) -> Option<f64>;
}
