//! Samples, alert records, decisions, and log rows.

use std::collections::BTreeMap;

use crate::{Channel, SeverityLevel};

/// Which monitoring path produced an observation.
///
/// Escalation state is kept independently per source kind so a flurry of
/// high-severity video frames cannot suppress or be confused with
/// event-source alerts, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SourceKind {
    /// Continuous samples from the video stream.
    Stream,
    /// Discrete events from a polled external feed.
    ExternalEvent,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Stream => "stream",
            SourceKind::ExternalEvent => "external_event",
        }
    }
}

/// One observation at a point in time.
///
/// Immutable once created. `sequence_index` is a source-local monotonic
/// counter (frame index for the stream, poll tick for the event feed).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// The classifiable scalar: a pixel row or a magnitude.
    pub raw_value: f64,
    pub sequence_index: u64,
}

/// The tier of a fired alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlertKind {
    /// Level-triggered: any sample at or above the notify severity is a
    /// candidate, rate-limited by per-channel cooldowns.
    Routine,
    /// Edge-triggered: a run of consecutive top-severity observations.
    Escalation,
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Routine => "routine",
            AlertKind::Escalation => "escalation",
        }
    }
}

/// The canonical payload for any dispatched notification.
///
/// Built once per decision and shared unmodified across every channel so
/// that all channels describe the same event consistently.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertRecord {
    pub timestamp_ms: u64,
    pub severity: SeverityLevel,
    pub raw_value: f64,
    pub location: String,
    pub consecutive_count: u32,
    pub source: SourceKind,
    pub sequence_index: u64,
    /// Source-specific fields passed through opaquely (seismic magnitude,
    /// depth, coordinates, tsunami potential, ...).
    #[cfg_attr(feature = "serde", serde(default))]
    pub source_payload: BTreeMap<String, String>,
}

/// The output of one classification step.
///
/// Transient; consumed by the dispatcher and the log sink, never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub kind: AlertKind,
    /// Channels whose independent cooldown has elapsed and are enabled.
    pub channels: Vec<Channel>,
    pub record: AlertRecord,
}

impl AlertDecision {
    /// A decision that fires through the given channels.
    pub fn alert(kind: AlertKind, channels: Vec<Channel>, record: AlertRecord) -> Self {
        Self {
            should_alert: true,
            kind,
            channels,
            record,
        }
    }

    /// A decision that does not fire; the record is still built for logging.
    pub fn quiet(record: AlertRecord) -> Self {
        Self {
            should_alert: false,
            kind: AlertKind::Routine,
            channels: Vec::new(),
            record,
        }
    }
}

/// One append-only row handed to the logging collaborator per processed
/// sample or event, whether or not an alert fired.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationRow {
    pub timestamp_ms: u64,
    pub source: SourceKind,
    pub sequence_index: u64,
    pub raw_value: f64,
    pub severity: SeverityLevel,
    pub consecutive_count: u32,
    pub alert_sent: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "serde", serde(default))]
    pub alert_kind: Option<AlertKind>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    #[cfg_attr(feature = "serde", serde(default))]
    pub channels_sent: Vec<Channel>,
}

impl ObservationRow {
    /// Build a row from a decision and the dispatch outcome.
    pub fn from_decision(decision: &AlertDecision, sent: &[Channel]) -> Self {
        Self {
            timestamp_ms: decision.record.timestamp_ms,
            source: decision.record.source,
            sequence_index: decision.record.sequence_index,
            raw_value: decision.record.raw_value,
            severity: decision.record.severity,
            consecutive_count: decision.record.consecutive_count,
            alert_sent: !sent.is_empty(),
            alert_kind: if sent.is_empty() {
                None
            } else {
                Some(decision.kind)
            },
            channels_sent: sent.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AlertRecord {
        AlertRecord {
            timestamp_ms: 1_700_000_000_000,
            severity: SeverityLevel::Extreme,
            raw_value: 150.0,
            location: "Kuta Beach".to_string(),
            consecutive_count: 12,
            source: SourceKind::Stream,
            sequence_index: 42,
            source_payload: BTreeMap::new(),
        }
    }

    #[test]
    fn test_quiet_decision_keeps_record() {
        let decision = AlertDecision::quiet(record());
        assert!(!decision.should_alert);
        assert!(decision.channels.is_empty());
        assert_eq!(decision.record.sequence_index, 42);
    }

    #[test]
    fn test_row_from_unsent_decision() {
        let decision = AlertDecision::alert(
            AlertKind::Escalation,
            vec![Channel::WhatsApp],
            record(),
        );
        let row = ObservationRow::from_decision(&decision, &[]);
        assert!(!row.alert_sent);
        assert_eq!(row.alert_kind, None);
    }

    #[test]
    fn test_row_from_sent_decision() {
        let decision = AlertDecision::alert(
            AlertKind::Escalation,
            vec![Channel::WhatsApp, Channel::Sms],
            record(),
        );
        let row = ObservationRow::from_decision(&decision, &[Channel::WhatsApp]);
        assert!(row.alert_sent);
        assert_eq!(row.alert_kind, Some(AlertKind::Escalation));
        assert_eq!(row.channels_sent, vec![Channel::WhatsApp]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_row_serializes_compactly() {
        let decision = AlertDecision::quiet(record());
        let row = ObservationRow::from_decision(&decision, &[]);
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"severity\":\"extreme\""));
        assert!(!json.contains("alert_kind"));
        assert!(!json.contains("channels_sent"));
    }
}
