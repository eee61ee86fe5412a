//! Alert delivery across notification channels.
//!
//! The [`Transport`] trait is the seam between the decision engine and the
//! provider adapters: the dispatcher fans one alert out to every requested
//! channel, isolating failures so a WhatsApp outage never blocks SMS.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tracing::{info, warn};

use wavewatch_adapters::AdapterError;
use wavewatch_adapters::sms::SmsSender;
use wavewatch_adapters::whatsapp::WhatsAppSender;
use wavewatch_types::{
    AlertKind, AlertRecord, Channel, ChannelOutcome, DispatchResult, SourceKind,
};

/// One way of reaching a human with a rendered alert body.
#[async_trait]
pub trait Transport: Send + Sync {
    fn channel(&self) -> Channel;

    /// Deliver the body, returning provider message ids on success.
    async fn send(&self, body: &str) -> Result<Vec<String>, AdapterError>;
}

#[async_trait]
impl Transport for SmsSender {
    fn channel(&self) -> Channel {
        SmsSender::channel(self)
    }

    async fn send(&self, body: &str) -> Result<Vec<String>, AdapterError> {
        SmsSender::send(self, body).await
    }
}

#[async_trait]
impl Transport for WhatsAppSender {
    fn channel(&self) -> Channel {
        WhatsAppSender::channel(self)
    }

    async fn send(&self, body: &str) -> Result<Vec<String>, AdapterError> {
        WhatsAppSender::send(self, body).await
    }
}

/// Message bodies keyed by source, alert kind and channel.
///
/// Templates are plain data so wording changes never touch dispatch logic.
/// `{name}` placeholders draw from the alert record first, then from its
/// source payload; unknown placeholders are left verbatim.
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    templates: BTreeMap<(SourceKind, AlertKind, Channel), String>,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        // WhatsApp carries the full context; SMS stays inside one segment.
        // Quake wording always states the feed's tsunami potential, routine
        // or escalated.
        let entries: [((SourceKind, AlertKind, Channel), &str); 8] = [
            (
                (SourceKind::Stream, AlertKind::Routine, Channel::WhatsApp),
                "Wave alert at {location}: severity {severity}, waterline peak {raw_value} px at {time}. Monitoring continues.",
            ),
            (
                (SourceKind::Stream, AlertKind::Routine, Channel::Sms),
                "WAVE {severity} {location}: {raw_value} px {time}",
            ),
            (
                (SourceKind::Stream, AlertKind::Escalation, Channel::WhatsApp),
                "TSUNAMI WARNING at {location}: {count} consecutive extreme readings, waterline peak {raw_value} px at {time}. Evacuate coastal areas immediately.",
            ),
            (
                (SourceKind::Stream, AlertKind::Escalation, Channel::Sms),
                "TSUNAMI WARNING {location}: {count}x extreme, {raw_value} px {time}. EVACUATE NOW",
            ),
            (
                (SourceKind::ExternalEvent, AlertKind::Routine, Channel::WhatsApp),
                "Earthquake M{raw_value} {region}, depth {depth}, at {time}. {tsunami_potential}. Coordinates: {coordinates}.",
            ),
            (
                (SourceKind::ExternalEvent, AlertKind::Routine, Channel::Sms),
                "QUAKE M{raw_value} {region} {depth} {time}. {tsunami_potential}",
            ),
            (
                (SourceKind::ExternalEvent, AlertKind::Escalation, Channel::WhatsApp),
                "MAJOR EARTHQUAKE M{raw_value} {region}, depth {depth}, at {time}. {tsunami_potential}. Follow local authority guidance.",
            ),
            (
                (SourceKind::ExternalEvent, AlertKind::Escalation, Channel::Sms),
                "MAJOR QUAKE M{raw_value} {region} {time}. {tsunami_potential}",
            ),
        ];
        let mut templates = BTreeMap::new();
        for (key, body) in entries {
            templates.insert(key, body.to_string());
        }
        Self { templates }
    }
}

impl MessageTemplates {
    pub fn set(
        &mut self,
        source: SourceKind,
        kind: AlertKind,
        channel: Channel,
        template: impl Into<String>,
    ) {
        self.templates.insert((source, kind, channel), template.into());
    }

    /// Render the body for one channel, falling back to a bare summary if
    /// no template is registered for the key.
    pub fn render(&self, kind: AlertKind, channel: Channel, record: &AlertRecord) -> String {
        match self.templates.get(&(record.source, kind, channel)) {
            Some(template) => fill(template, record),
            None => format!(
                "{} at {}: severity {}, value {}",
                kind.label(),
                record.location,
                record.severity,
                record.raw_value
            ),
        }
    }
}

fn fill(template: &str, record: &AlertRecord) -> String {
    let timestamp = format_timestamp(record.timestamp_ms);
    let mut body = template
        .replace("{time}", &timestamp)
        .replace("{location}", &record.location)
        .replace("{severity}", record.severity.label())
        .replace("{raw_value}", &trim_float(record.raw_value))
        .replace("{count}", &record.consecutive_count.to_string())
        .replace("{sequence}", &record.sequence_index.to_string());
    for (key, value) in &record.source_payload {
        body = body.replace(&format!("{{{key}}}"), value);
    }
    body
}

fn format_timestamp(timestamp_ms: u64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms as i64).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => timestamp_ms.to_string(),
    }
}

fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Fans alerts out to registered transports with per-channel isolation.
pub struct Dispatcher {
    transports: BTreeMap<Channel, Arc<dyn Transport>>,
    templates: MessageTemplates,
}

impl Dispatcher {
    pub fn new(templates: MessageTemplates) -> Self {
        Self {
            transports: BTreeMap::new(),
            templates,
        }
    }

    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        self.transports.insert(transport.channel(), transport);
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.transports.contains_key(&channel)
    }

    pub fn available(&self) -> Vec<Channel> {
        self.transports.keys().copied().collect()
    }

    /// Send one alert over every requested channel.
    ///
    /// Each channel gets its own rendered body and its own outcome; partial
    /// success is an ordinary result, not an error.
    pub async fn dispatch(
        &self,
        kind: AlertKind,
        record: &AlertRecord,
        channels: &[Channel],
    ) -> DispatchResult {
        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in channels {
            let Some(transport) = self.transports.get(channel) else {
                warn!(channel = channel.label(), "no transport registered");
                outcomes.push(ChannelOutcome::failed(*channel, "no transport registered"));
                continue;
            };
            let body = self.templates.render(kind, *channel, record);
            match transport.send(&body).await {
                Ok(ids) => {
                    info!(
                        channel = channel.label(),
                        kind = kind.label(),
                        severity = record.severity.label(),
                        "alert delivered"
                    );
                    outcomes.push(ChannelOutcome::sent(*channel, &ids));
                }
                Err(err) => {
                    warn!(
                        channel = channel.label(),
                        kind = kind.label(),
                        error = %err,
                        "alert delivery failed"
                    );
                    outcomes.push(ChannelOutcome::failed(*channel, err.to_string()));
                }
            }
        }
        let result = DispatchResult { outcomes };
        if result.is_partial() {
            warn!(
                sent = ?result.sent_channels(),
                "alert delivered on some channels only"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;
    use std::sync::Mutex;

    use wavewatch_types::SeverityLevel;

    struct FakeTransport {
        channel: Channel,
        fail: bool,
        bodies: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(channel: Channel, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                fail,
                bodies: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(&self, body: &str) -> Result<Vec<String>, AdapterError> {
            self.bodies.lock().unwrap().push(body.to_string());
            if self.fail {
                Err(AdapterError::Http("boom".into()))
            } else {
                Ok(vec!["SM123".into()])
            }
        }
    }

    fn record(source: SourceKind) -> AlertRecord {
        let mut payload = Map::new();
        if source == SourceKind::ExternalEvent {
            payload.insert("region".into(), "Banda Sea".into());
            payload.insert("depth".into(), "10 km".into());
            payload.insert("coordinates".into(), "4.5 LS, 129.2 BT".into());
            payload.insert("tsunami_potential".into(), "Tsunami potential".into());
        }
        AlertRecord {
            timestamp_ms: 1_700_000_000_000,
            severity: SeverityLevel::Extreme,
            raw_value: 150.0,
            location: "Kuta Beach".into(),
            consecutive_count: 12,
            source,
            sequence_index: 42,
            source_payload: payload,
        }
    }

    #[tokio::test]
    async fn test_dispatch_all_channels_sent() {
        let mut dispatcher = Dispatcher::new(MessageTemplates::default());
        dispatcher.register(FakeTransport::new(Channel::WhatsApp, false));
        dispatcher.register(FakeTransport::new(Channel::Sms, false));

        let result = dispatcher
            .dispatch(
                AlertKind::Routine,
                &record(SourceKind::Stream),
                &[Channel::WhatsApp, Channel::Sms],
            )
            .await;
        assert!(result.all_sent());
        assert_eq!(result.sent_channels(), vec![Channel::WhatsApp, Channel::Sms]);
    }

    #[tokio::test]
    async fn test_dispatch_isolates_channel_failure() {
        let mut dispatcher = Dispatcher::new(MessageTemplates::default());
        dispatcher.register(FakeTransport::new(Channel::WhatsApp, true));
        dispatcher.register(FakeTransport::new(Channel::Sms, false));

        let result = dispatcher
            .dispatch(
                AlertKind::Escalation,
                &record(SourceKind::Stream),
                &[Channel::WhatsApp, Channel::Sms],
            )
            .await;
        assert!(result.is_partial());
        assert_eq!(result.sent_channels(), vec![Channel::Sms]);
    }

    #[tokio::test]
    async fn test_dispatch_missing_transport_is_failure_outcome() {
        let dispatcher = Dispatcher::new(MessageTemplates::default());
        let result = dispatcher
            .dispatch(
                AlertKind::Routine,
                &record(SourceKind::Stream),
                &[Channel::Sms],
            )
            .await;
        assert!(!result.any_sent());
        assert_eq!(result.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_escalation_body_mentions_streak() {
        let transport = FakeTransport::new(Channel::WhatsApp, false);
        let mut dispatcher = Dispatcher::new(MessageTemplates::default());
        dispatcher.register(transport.clone());

        dispatcher
            .dispatch(
                AlertKind::Escalation,
                &record(SourceKind::Stream),
                &[Channel::WhatsApp],
            )
            .await;
        let bodies = transport.bodies.lock().unwrap();
        assert!(bodies[0].contains("TSUNAMI WARNING"));
        assert!(bodies[0].contains("12 consecutive"));
        assert!(bodies[0].contains("Kuta Beach"));
    }

    #[test]
    fn test_render_quake_payload_placeholders() {
        let templates = MessageTemplates::default();
        let body = templates.render(
            AlertKind::Escalation,
            Channel::WhatsApp,
            &record(SourceKind::ExternalEvent),
        );
        assert!(body.contains("Banda Sea"));
        assert!(body.contains("10 km"));
        assert!(body.contains("Tsunami potential"));
        assert!(!body.contains('{'));
    }

    #[test]
    fn test_channels_render_distinct_bodies() {
        let templates = MessageTemplates::default();
        for source in [SourceKind::Stream, SourceKind::ExternalEvent] {
            for kind in [AlertKind::Routine, AlertKind::Escalation] {
                let record = record(source);
                let sms = templates.render(kind, Channel::Sms, &record);
                let whatsapp = templates.render(kind, Channel::WhatsApp, &record);
                assert_ne!(sms, whatsapp);
                assert!(sms.len() < whatsapp.len());
            }
        }
    }

    #[test]
    fn test_routine_quake_states_tsunami_potential() {
        let templates = MessageTemplates::default();
        let record = record(SourceKind::ExternalEvent);
        for channel in Channel::ALL {
            let body = templates.render(AlertKind::Routine, channel, &record);
            assert!(body.contains("Tsunami potential"));
            assert!(!body.contains('{'));
        }
    }

    #[test]
    fn test_render_falls_back_without_template() {
        let mut templates = MessageTemplates::default();
        templates.templates.clear();
        let body = templates.render(AlertKind::Routine, Channel::Sms, &record(SourceKind::Stream));
        assert!(body.contains("Kuta Beach"));
    }

    #[test]
    fn test_timestamp_formatting() {
        let body = format_timestamp(0);
        assert_eq!(body, "1970-01-01 00:00:00 UTC");
    }
}
