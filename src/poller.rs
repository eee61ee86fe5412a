//! Periodic earthquake feed polling with dedup and its own alert state.
//!
//! The poller shares the dispatcher with the stream session but keeps its
//! own tracker, so seismic alerts and wave alerts never suppress each
//! other. Feed failures are logged and retried on the next tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::escalation::EscalationTracker;
use crate::session::unix_time_ms;
use crate::sink::ObservationSink;
use wavewatch_adapters::bmkg::{BmkgClient, QuakeEvent};
use wavewatch_adapters::AdapterError;
use wavewatch_types::{AlertDecision, ObservationRow, Sample, SeverityScale};

/// Source of the latest seismic event.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn latest(&self) -> Result<QuakeEvent, AdapterError>;
}

#[async_trait]
impl EventFeed for BmkgClient {
    async fn latest(&self) -> Result<QuakeEvent, AdapterError> {
        BmkgClient::latest(self).await
    }
}

/// A previously processed event, for skipping unchanged feed responses.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EventIdentity {
    datetime: String,
    region: String,
}

impl EventIdentity {
    fn of(event: &QuakeEvent) -> Self {
        Self {
            datetime: event.datetime.clone(),
            region: event.region.clone(),
        }
    }
}

pub struct EventPoller<F: EventFeed> {
    feed: F,
    scale: SeverityScale,
    tracker: EscalationTracker,
    dispatcher: Arc<Dispatcher>,
    sink: Box<dyn ObservationSink>,
    interval: Duration,
    last_seen: Option<EventIdentity>,
    sequence: u64,
}

impl<F: EventFeed> EventPoller<F> {
    pub fn new(
        feed: F,
        scale: SeverityScale,
        tracker: EscalationTracker,
        dispatcher: Arc<Dispatcher>,
        sink: Box<dyn ObservationSink>,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            scale,
            tracker,
            dispatcher,
            sink,
            interval,
            last_seen: None,
            sequence: 0,
        }
    }

    /// Poll on a fixed interval until the stop signal flips. The first
    /// poll happens immediately.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "event poller started");

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    // A dropped sender can never signal; shut down instead
                    // of spinning on the closed channel.
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
            if *stop.borrow() {
                break;
            }
        }
        info!("event poller stopped");
    }

    /// Fetch the latest event and run it through the alert pipeline.
    ///
    /// Returns the decision for a newly seen event, `None` when the feed
    /// failed or the latest event was already processed.
    pub async fn poll_once(&mut self) -> Option<AlertDecision> {
        let event = match self.feed.latest().await {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "event poll failed, retrying next interval");
                return None;
            }
        };

        let identity = EventIdentity::of(&event);
        if self.last_seen.as_ref() == Some(&identity) {
            debug!("latest event unchanged, skipped");
            return None;
        }
        self.last_seen = Some(identity);
        self.sequence += 1;

        let sample = Sample {
            timestamp_ms: event
                .occurred_at
                .map(|t| t.timestamp_millis().max(0) as u64)
                .unwrap_or_else(unix_time_ms),
            raw_value: event.magnitude,
            sequence_index: self.sequence,
        };
        let level = self.scale.classify(event.magnitude);
        info!(
            magnitude = event.magnitude,
            region = %event.region,
            severity = level.label(),
            "new seismic event"
        );

        self.tracker.set_location(event.region.clone());
        let payload = event_payload(&event);
        let decision = self.tracker.observe(&sample, level, payload);

        let sent = if decision.should_alert && !decision.channels.is_empty() {
            let result = self
                .dispatcher
                .dispatch(decision.kind, &decision.record, &decision.channels)
                .await;
            let sent = result.sent_channels();
            self.tracker.confirm_sent(decision.kind, &sent);
            sent
        } else {
            Vec::new()
        };

        if let Err(err) = self.sink.append(&ObservationRow::from_decision(&decision, &sent)) {
            warn!(error = %err, "failed to append observation row");
        }
        Some(decision)
    }
}

fn event_payload(event: &QuakeEvent) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    payload.insert("datetime".to_string(), event.datetime.clone());
    payload.insert("magnitude".to_string(), format!("{}", event.magnitude));
    payload.insert("depth".to_string(), event.depth.clone());
    payload.insert("region".to_string(), event.region.clone());
    payload.insert("coordinates".to_string(), event.coordinates.clone());
    payload.insert(
        "tsunami_potential".to_string(),
        event.tsunami_potential.clone(),
    );
    if !event.felt.is_empty() {
        payload.insert("felt".to_string(), event.felt.clone());
    }
    payload
}
