//! Connection lifecycle: bounded opening, stall detection, reconnection.

use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{FrameReader, FrameTransport, SourceError};

/// Tunables for one managed connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Where to connect, in whatever form the transport understands.
    pub descriptor: String,
    /// Attempts before [`ConnectionManager::open`] gives up.
    pub connect_attempts: u32,
    pub connect_timeout: Duration,
    /// How long a single frame read may block before counting as quiet.
    pub read_timeout: Duration,
    /// Frameless time below this is jitter; at or above it, a stall.
    pub stall_window: Duration,
    /// Wait after a failed in-flight reconnect before trying again.
    pub retry_cooldown: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            descriptor: String::new(),
            connect_attempts: 3,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(2),
            stall_window: Duration::from_secs(60),
            retry_cooldown: Duration::from_secs(30),
        }
    }
}

/// What one read round produced.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame {
        payload: Vec<u8>,
        sequence_index: u64,
    },
    /// No frame this round: jitter, a stall being handled, or a cooldown.
    Quiet,
}

/// Keeps one frame connection alive across stalls.
///
/// Opening is fallible and bounded; after that, every disruption is handled
/// internally and surfaces to the caller only as [`ReadOutcome::Quiet`].
/// A stall triggers a single warning and a single reconnect attempt per
/// incident; a failed reconnect starts a retry cooldown that is checked,
/// not slept, so the caller's loop stays responsive.
pub struct ConnectionManager<T: FrameTransport> {
    transport: T,
    config: ConnectionConfig,
    reader: Option<Box<dyn FrameReader>>,
    last_frame_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    stall_notified: bool,
    sequence: u64,
}

impl<T: FrameTransport> ConnectionManager<T> {
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport,
            config,
            reader: None,
            last_frame_at: None,
            cooldown_until: None,
            stall_notified: false,
            sequence: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Establish the initial connection, retrying up to the configured
    /// attempt count.
    pub async fn open(&mut self) -> Result<(), SourceError> {
        for attempt in 1..=self.config.connect_attempts.max(1) {
            match timeout(
                self.config.connect_timeout,
                self.transport.connect(&self.config.descriptor),
            )
            .await
            {
                Ok(Ok(reader)) => {
                    info!(
                        descriptor = %self.config.descriptor,
                        attempt,
                        "connected to frame source"
                    );
                    self.attach(reader, Instant::now());
                    return Ok(());
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "connection attempt failed");
                }
                Err(_) => {
                    warn!(attempt, "connection attempt timed out");
                }
            }
        }
        Err(SourceError::Exhausted {
            descriptor: self.config.descriptor.clone(),
            attempts: self.config.connect_attempts.max(1),
        })
    }

    /// Read the next frame, absorbing stalls and reconnects.
    pub async fn read_next(&mut self) -> ReadOutcome {
        self.read_at(Instant::now()).await
    }

    /// Read the next frame against an explicit clock.
    pub async fn read_at(&mut self, now: Instant) -> ReadOutcome {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return ReadOutcome::Quiet;
            }
            self.cooldown_until = None;
        }

        if self.reader.is_none() {
            self.reconnect(now).await;
            return ReadOutcome::Quiet;
        }

        let read = {
            // reader checked non-empty above
            let Some(reader) = self.reader.as_mut() else {
                return ReadOutcome::Quiet;
            };
            timeout(self.config.read_timeout, reader.read_frame()).await
        };

        match read {
            Ok(Ok(Some(payload))) => {
                self.last_frame_at = Some(now);
                self.stall_notified = false;
                self.sequence += 1;
                ReadOutcome::Frame {
                    payload,
                    sequence_index: self.sequence,
                }
            }
            Ok(Ok(None)) => {
                self.handle_frameless(now).await;
                ReadOutcome::Quiet
            }
            Ok(Err(err)) => {
                debug!(error = %err, "frame read failed");
                self.handle_frameless(now).await;
                ReadOutcome::Quiet
            }
            Err(_) => {
                self.handle_frameless(now).await;
                ReadOutcome::Quiet
            }
        }
    }

    /// Tear the connection down; drop closes the underlying handle.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            info!(descriptor = %self.config.descriptor, "connection closed");
        }
    }

    fn attach(&mut self, reader: Box<dyn FrameReader>, now: Instant) {
        self.reader = Some(reader);
        self.last_frame_at = Some(now);
        self.stall_notified = false;
        self.cooldown_until = None;
    }

    async fn handle_frameless(&mut self, now: Instant) {
        let stalled = self
            .last_frame_at
            .map_or(true, |at| now.duration_since(at) >= self.config.stall_window);
        if !stalled {
            // short gaps are ordinary jitter
            return;
        }
        if !self.stall_notified {
            warn!(
                descriptor = %self.config.descriptor,
                window_secs = self.config.stall_window.as_secs(),
                "stream stalled, attempting reconnect"
            );
            self.stall_notified = true;
        }
        self.reader = None;
        self.reconnect(now).await;
    }

    async fn reconnect(&mut self, now: Instant) {
        match timeout(
            self.config.connect_timeout,
            self.transport.connect(&self.config.descriptor),
        )
        .await
        {
            Ok(Ok(reader)) => {
                info!(descriptor = %self.config.descriptor, "connection restored");
                self.attach(reader, now);
            }
            Ok(Err(err)) => {
                warn!(
                    error = %err,
                    cooldown_secs = self.config.retry_cooldown.as_secs(),
                    "reconnect failed, backing off"
                );
                self.cooldown_until = Some(now + self.config.retry_cooldown);
            }
            Err(_) => {
                warn!(
                    cooldown_secs = self.config.retry_cooldown.as_secs(),
                    "reconnect timed out, backing off"
                );
                self.cooldown_until = Some(now + self.config.retry_cooldown);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    type Script = VecDeque<Result<Option<Vec<u8>>, SourceError>>;

    struct ScriptReader {
        script: Script,
    }

    #[async_trait]
    impl FrameReader for ScriptReader {
        async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    struct FakeTransport {
        connects: AtomicU32,
        fail_until: u32,
        scripts: Mutex<VecDeque<Script>>,
    }

    impl FakeTransport {
        fn new(fail_until: u32, scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicU32::new(0),
                fail_until,
                scripts: Mutex::new(scripts.into_iter().collect()),
            })
        }

        fn connect_count(&self) -> u32 {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FrameTransport for Arc<FakeTransport> {
        async fn connect(&self, descriptor: &str) -> Result<Box<dyn FrameReader>, SourceError> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_until {
                return Err(SourceError::Connect {
                    descriptor: descriptor.to_string(),
                    reason: "refused".to_string(),
                });
            }
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(Box::new(ScriptReader { script }))
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            descriptor: "127.0.0.1:9000".to_string(),
            connect_attempts: 3,
            connect_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(50),
            stall_window: Duration::from_secs(60),
            retry_cooldown: Duration::from_secs(30),
        }
    }

    fn frames(values: &[&str]) -> Script {
        values
            .iter()
            .map(|v| Ok(Some(v.as_bytes().to_vec())))
            .collect()
    }

    #[tokio::test]
    async fn test_open_succeeds_within_attempts() {
        let transport = FakeTransport::new(2, vec![frames(&["100"])]);
        let mut manager = ConnectionManager::new(transport.clone(), config());
        manager.open().await.unwrap();
        assert!(manager.is_connected());
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_open_exhausts_attempts() {
        let transport = FakeTransport::new(10, vec![]);
        let mut manager = ConnectionManager::new(transport.clone(), config());
        let err = manager.open().await.unwrap_err();
        assert!(matches!(err, SourceError::Exhausted { attempts: 3, .. }));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_frames_arrive_with_monotonic_sequence() {
        let transport = FakeTransport::new(0, vec![frames(&["100", "200"])]);
        let mut manager = ConnectionManager::new(transport, config());
        manager.open().await.unwrap();

        let now = Instant::now();
        match manager.read_at(now).await {
            ReadOutcome::Frame {
                payload,
                sequence_index,
            } => {
                assert_eq!(payload, b"100");
                assert_eq!(sequence_index, 1);
            }
            ReadOutcome::Quiet => panic!("expected a frame"),
        }
        match manager.read_at(now).await {
            ReadOutcome::Frame { sequence_index, .. } => assert_eq!(sequence_index, 2),
            ReadOutcome::Quiet => panic!("expected a frame"),
        }
    }

    #[tokio::test]
    async fn test_short_gap_is_jitter_not_stall() {
        let transport = FakeTransport::new(0, vec![Script::new()]);
        let mut manager = ConnectionManager::new(transport.clone(), config());
        manager.open().await.unwrap();

        // 10s of quiet is below the 60s window: no reconnect.
        let soon = Instant::now() + Duration::from_secs(10);
        assert!(matches!(manager.read_at(soon).await, ReadOutcome::Quiet));
        assert_eq!(transport.connect_count(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_stall_triggers_single_reconnect() {
        let transport = FakeTransport::new(0, vec![Script::new(), frames(&["300"])]);
        let mut manager = ConnectionManager::new(transport.clone(), config());
        manager.open().await.unwrap();

        let stalled = Instant::now() + Duration::from_secs(61);
        assert!(matches!(manager.read_at(stalled).await, ReadOutcome::Quiet));
        assert_eq!(transport.connect_count(), 2);

        // Restored connection delivers frames again.
        match manager.read_at(stalled).await {
            ReadOutcome::Frame { payload, .. } => assert_eq!(payload, b"300"),
            ReadOutcome::Quiet => panic!("expected a frame after reconnect"),
        }
    }

    #[tokio::test]
    async fn test_failed_reconnect_enters_cooldown() {
        let all_fail = FakeTransport::new(u32::MAX, vec![]);
        let mut manager = ConnectionManager::new(all_fail.clone(), {
            let mut c = config();
            c.connect_attempts = 1;
            c
        });
        // Force a reconnect path with no reader attached.
        let t0 = Instant::now();
        assert!(matches!(manager.read_at(t0).await, ReadOutcome::Quiet));
        assert_eq!(all_fail.connect_count(), 1);

        // Inside the cooldown nothing is attempted.
        let t1 = t0 + Duration::from_secs(10);
        assert!(matches!(manager.read_at(t1).await, ReadOutcome::Quiet));
        assert_eq!(all_fail.connect_count(), 1);

        // After the cooldown one more attempt is made.
        let t2 = t0 + Duration::from_secs(31);
        assert!(matches!(manager.read_at(t2).await, ReadOutcome::Quiet));
        assert_eq!(all_fail.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_read_error_counts_as_frameless() {
        let mut script = Script::new();
        script.push_back(Err(SourceError::Read("reset by peer".into())));
        script.push_back(Ok(Some(b"150".to_vec())));
        let transport = FakeTransport::new(0, vec![script]);
        let mut manager = ConnectionManager::new(transport.clone(), config());
        manager.open().await.unwrap();

        let now = Instant::now();
        // Error inside the stall window: treated as quiet, no reconnect.
        assert!(matches!(manager.read_at(now).await, ReadOutcome::Quiet));
        assert_eq!(transport.connect_count(), 1);
        assert!(matches!(
            manager.read_at(now).await,
            ReadOutcome::Frame { .. }
        ));
    }

    #[tokio::test]
    async fn test_close_tears_down() {
        let transport = FakeTransport::new(0, vec![frames(&["1"])]);
        let mut manager = ConnectionManager::new(transport, config());
        manager.open().await.unwrap();
        manager.close();
        assert!(!manager.is_connected());
    }
}
