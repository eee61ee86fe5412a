//! The stream monitoring loop: read, analyze, classify, decide, deliver,
//! log. One iteration per frame; the loop checks the stop signal between
//! iterations and backs off briefly when a read round produced nothing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::GapPolicy;
use crate::dispatch::Dispatcher;
use crate::escalation::EscalationTracker;
use crate::sink::ObservationSink;
use crate::source::{ConnectionManager, FrameAnalyzer, FrameTransport, ReadOutcome, SourceError};
use wavewatch_types::{AlertDecision, Channel, ObservationRow, Sample, SeverityScale};

pub(crate) fn unix_time_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One monitoring session over one managed connection.
pub struct MonitorSession<T: FrameTransport, A: FrameAnalyzer> {
    connection: ConnectionManager<T>,
    analyzer: A,
    scale: SeverityScale,
    tracker: EscalationTracker,
    dispatcher: Arc<Dispatcher>,
    sink: Box<dyn ObservationSink>,
    gap_policy: GapPolicy,
    idle_backoff: Duration,
    last_raw: Option<f64>,
}

impl<T: FrameTransport, A: FrameAnalyzer> MonitorSession<T, A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection: ConnectionManager<T>,
        analyzer: A,
        scale: SeverityScale,
        tracker: EscalationTracker,
        dispatcher: Arc<Dispatcher>,
        sink: Box<dyn ObservationSink>,
        gap_policy: GapPolicy,
        idle_backoff: Duration,
    ) -> Self {
        Self {
            connection,
            analyzer,
            scale,
            tracker,
            dispatcher,
            sink,
            gap_policy,
            idle_backoff,
            last_raw: None,
        }
    }

    /// Run until the stop signal flips. Fails only if the initial
    /// connection cannot be established; after that, disruptions are
    /// absorbed by the connection manager.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> Result<(), SourceError> {
        self.connection.open().await?;
        info!("monitoring session started");

        while !*stop.borrow() {
            match self.connection.read_next().await {
                ReadOutcome::Frame {
                    payload,
                    sequence_index,
                } => {
                    self.process_frame(&payload, sequence_index).await;
                }
                ReadOutcome::Quiet => {
                    tokio::select! {
                        changed = stop.changed() => {
                            // A dropped sender can never signal; shut down
                            // instead of spinning on the closed channel.
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.idle_backoff) => {}
                    }
                }
            }
        }

        self.connection.close();
        info!("monitoring session stopped");
        Ok(())
    }

    /// Process one frame end to end; visible for tests.
    pub async fn process_frame(&mut self, payload: &[u8], sequence_index: u64) {
        let raw_value = match self.analyzer.raw_value(payload) {
            Some(value) => {
                self.last_raw = Some(value);
                value
            }
            None => match self.gap_policy {
                GapPolicy::ReuseLast => match self.last_raw {
                    Some(value) => value,
                    None => {
                        debug!(sequence_index, "no reading yet to reuse, frame skipped");
                        return;
                    }
                },
                GapPolicy::Exclude => {
                    debug!(sequence_index, "frame without reading excluded");
                    return;
                }
            },
        };

        if !raw_value.is_finite() {
            warn!(sequence_index, "non-finite reading treated as baseline");
        }

        let sample = Sample {
            timestamp_ms: unix_time_ms(),
            raw_value,
            sequence_index,
        };
        let level = self.scale.classify(raw_value);
        let decision = self.tracker.observe(&sample, level, BTreeMap::new());
        let sent = self.deliver(&decision).await;
        if let Err(err) = self.sink.append(&ObservationRow::from_decision(&decision, &sent)) {
            warn!(error = %err, "failed to append observation row");
        }
    }

    async fn deliver(&mut self, decision: &AlertDecision) -> Vec<Channel> {
        if !decision.should_alert || decision.channels.is_empty() {
            return Vec::new();
        }
        let result = self
            .dispatcher
            .dispatch(decision.kind, &decision.record, &decision.channels)
            .await;
        let sent = result.sent_channels();
        self.tracker.confirm_sent(decision.kind, &sent);
        sent
    }
}
