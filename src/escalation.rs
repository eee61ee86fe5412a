//! Escalation tracking: from classified observations to alert decisions.
//!
//! The tracker owns all alerting state for one monitored source - the
//! consecutive top-severity counter and the cooldown clocks - and turns
//! each classified sample into an [`AlertDecision`]. State is explicit and
//! per-session: the stream loop and the event poller each hold their own
//! tracker, keyed by source kind, so neither can suppress the other.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

use wavewatch_types::{
    AlertDecision, AlertKind, AlertRecord, Channel, Sample, SeverityLevel, SourceKind,
};

/// Per-channel enablement and routine cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub enabled: bool,
    pub cooldown: Duration,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// When and through which channels alerts may fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Routine alerts fire at or above this level.
    pub notify_level: SeverityLevel,
    /// Consecutive top-severity samples required for an escalation alert.
    pub escalation_count: u32,
    /// Cooldown between escalation alerts, typically much longer than the
    /// per-channel routine cooldowns.
    pub escalation_cooldown: Duration,
    pub escalation_enabled: bool,
    pub whatsapp: ChannelPolicy,
    pub sms: ChannelPolicy,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            notify_level: SeverityLevel::High,
            escalation_count: 12,
            escalation_cooldown: Duration::from_secs(1800),
            escalation_enabled: false,
            whatsapp: ChannelPolicy::default(),
            sms: ChannelPolicy::default(),
        }
    }
}

impl EscalationPolicy {
    pub fn channel(&self, channel: Channel) -> &ChannelPolicy {
        match channel {
            Channel::WhatsApp => &self.whatsapp,
            Channel::Sms => &self.sms,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelPolicy {
        match channel {
            Channel::WhatsApp => &mut self.whatsapp,
            Channel::Sms => &mut self.sms,
        }
    }

    /// Channels enabled by configuration, regardless of cooldown state.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.channel(*c).enabled)
            .collect()
    }
}

/// Mutable alerting state for one monitoring session.
///
/// Mutated exclusively by [`EscalationTracker`]; cooldown clocks advance
/// only when a send is confirmed, so a transport failure leaves the next
/// qualifying sample free to retry immediately.
#[derive(Debug, Clone, Default)]
pub struct EscalationState {
    consecutive_critical: u32,
    /// Set once the current streak has produced a confirmed escalation
    /// alert, so the same streak never refires.
    streak_fired: bool,
    last_level: Option<SeverityLevel>,
    last_routine: BTreeMap<Channel, Instant>,
    last_escalation: Option<Instant>,
}

/// Decides whether one classified observation warrants notifying a human.
#[derive(Debug)]
pub struct EscalationTracker {
    policy: EscalationPolicy,
    source: SourceKind,
    location: String,
    state: EscalationState,
}

impl EscalationTracker {
    pub fn new(policy: EscalationPolicy, source: SourceKind, location: impl Into<String>) -> Self {
        Self {
            policy,
            source,
            location: location.into(),
            state: EscalationState::default(),
        }
    }

    /// Process one classified sample.
    pub fn observe(
        &mut self,
        sample: &Sample,
        level: SeverityLevel,
        payload: BTreeMap<String, String>,
    ) -> AlertDecision {
        self.observe_at(sample, level, payload, Instant::now())
    }

    /// Process one classified sample against an explicit clock.
    ///
    /// Order matters: the consecutive count is updated first, then the
    /// escalation condition is evaluated, then the routine condition.
    /// Escalation wins the decision when both qualify; their clocks stay
    /// independent either way.
    pub fn observe_at(
        &mut self,
        sample: &Sample,
        level: SeverityLevel,
        payload: BTreeMap<String, String>,
        now: Instant,
    ) -> AlertDecision {
        if level == SeverityLevel::top() {
            self.state.consecutive_critical += 1;
        } else {
            if self.state.consecutive_critical > 0 {
                debug!(
                    source = self.source.label(),
                    count = self.state.consecutive_critical,
                    "severity dropped below top level, streak reset"
                );
            }
            self.state.consecutive_critical = 0;
            self.state.streak_fired = false;
        }
        self.state.last_level = Some(level);

        let record = AlertRecord {
            timestamp_ms: sample.timestamp_ms,
            severity: level,
            raw_value: sample.raw_value,
            location: self.location.clone(),
            consecutive_count: self.state.consecutive_critical,
            source: self.source,
            sequence_index: sample.sequence_index,
            source_payload: payload,
        };

        if self.escalation_ready(now) {
            let channels = self.policy.enabled_channels();
            if !channels.is_empty() {
                return AlertDecision::alert(AlertKind::Escalation, channels, record);
            }
        }

        if level >= self.policy.notify_level {
            let channels = self.routine_channels(now);
            if !channels.is_empty() {
                return AlertDecision::alert(AlertKind::Routine, channels, record);
            }
        }

        AlertDecision::quiet(record)
    }

    /// Record confirmed sends, advancing the matching cooldown clocks.
    pub fn confirm_sent(&mut self, kind: AlertKind, channels: &[Channel]) {
        self.confirm_sent_at(kind, channels, Instant::now());
    }

    /// Record confirmed sends against an explicit clock.
    pub fn confirm_sent_at(&mut self, kind: AlertKind, channels: &[Channel], now: Instant) {
        if channels.is_empty() {
            return;
        }
        match kind {
            AlertKind::Routine => {
                for channel in channels {
                    self.state.last_routine.insert(*channel, now);
                }
            }
            AlertKind::Escalation => {
                self.state.last_escalation = Some(now);
                self.state.streak_fired = true;
            }
        }
    }

    /// The current consecutive top-severity count.
    pub fn consecutive_count(&self) -> u32 {
        self.state.consecutive_critical
    }

    /// The most recently observed level, if any sample was seen.
    pub fn last_level(&self) -> Option<SeverityLevel> {
        self.state.last_level
    }

    /// Replace the location label attached to subsequent records.
    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    fn escalation_ready(&self, now: Instant) -> bool {
        if !self.policy.escalation_enabled || self.state.streak_fired {
            return false;
        }
        if self.state.consecutive_critical < self.policy.escalation_count {
            return false;
        }
        match self.state.last_escalation {
            Some(last) => now.duration_since(last) >= self.policy.escalation_cooldown,
            None => true,
        }
    }

    fn routine_channels(&self, now: Instant) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| {
                let policy = self.policy.channel(*c);
                if !policy.enabled {
                    return false;
                }
                match self.state.last_routine.get(c) {
                    Some(last) => now.duration_since(*last) >= policy.cooldown,
                    None => true,
                }
            })
            .collect()
    }
}
