//! Line-oriented TCP frame source.
//!
//! The reference deployment runs the pixel analysis next to the camera and
//! publishes one peak reading per line over a plain TCP socket; this
//! transport consumes that feed. Any newline-delimited numeric feed works.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;

use super::{FrameAnalyzer, FrameReader, FrameTransport, SourceError};

/// Connects to a `host:port` descriptor.
pub struct TcpTransport;

#[async_trait]
impl FrameTransport for TcpTransport {
    async fn connect(&self, descriptor: &str) -> Result<Box<dyn FrameReader>, SourceError> {
        let stream = TcpStream::connect(descriptor)
            .await
            .map_err(|err| SourceError::Connect {
                descriptor: descriptor.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Box::new(LineFrameReader::new(stream)))
    }
}

/// Reads newline-delimited frames from any async byte stream.
///
/// A blank line is a frame with no reading and surfaces as `Ok(None)`; end
/// of stream is a read error so the connection manager tears down.
pub struct LineFrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin + Send> LineFrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameReader for LineFrameReader<R> {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => Err(SourceError::Read("connection closed by peer".to_string())),
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.as_bytes().to_vec()))
                }
            }
            Err(err) => Err(SourceError::Read(err.to_string())),
        }
    }
}

/// Parses each frame as a single decimal reading.
pub struct NumericLineAnalyzer;

impl FrameAnalyzer for NumericLineAnalyzer {
    fn raw_value(&self, frame: &[u8]) -> Option<f64> {
        std::str::from_utf8(frame).ok()?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[tokio::test]
    async fn test_reads_lines_as_frames() {
        let mut reader = LineFrameReader::new(Cursor::new(b"245.5\n198\n".to_vec()));
        assert_eq!(reader.read_frame().await.unwrap(), Some(b"245.5".to_vec()));
        assert_eq!(reader.read_frame().await.unwrap(), Some(b"198".to_vec()));
    }

    #[tokio::test]
    async fn test_blank_line_is_frameless() {
        let mut reader = LineFrameReader::new(Cursor::new(b"\n180\n".to_vec()));
        assert_eq!(reader.read_frame().await.unwrap(), None);
        assert_eq!(reader.read_frame().await.unwrap(), Some(b"180".to_vec()));
    }

    #[tokio::test]
    async fn test_eof_is_read_error() {
        let mut reader = LineFrameReader::new(Cursor::new(Vec::new()));
        assert!(matches!(
            reader.read_frame().await,
            Err(SourceError::Read(_))
        ));
    }

    #[test]
    fn test_numeric_analyzer_parses_readings() {
        let analyzer = NumericLineAnalyzer;
        assert_eq!(analyzer.raw_value(b"245.5"), Some(245.5));
        assert_eq!(analyzer.raw_value(b"  198 "), Some(198.0));
        assert_eq!(analyzer.raw_value(b"n/a"), None);
        assert_eq!(analyzer.raw_value(&[0xff, 0xfe]), None);
    }

    #[tokio::test]
    async fn test_tcp_connect_refused_maps_to_connect_error() {
        // Port 1 on loopback is not listening.
        let err = TcpTransport.connect("127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, SourceError::Connect { .. }));
    }
}
