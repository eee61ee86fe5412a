//! Notification channels and per-channel dispatch results.

use core::fmt;

/// One independent notification transport.
///
/// Each channel carries its own enable flag and cooldown clock; disabling
/// or losing one channel never affects the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Channel {
    WhatsApp,
    Sms,
}

impl Channel {
    /// All known channels.
    pub const ALL: [Channel; 2] = [Channel::WhatsApp, Channel::Sms];

    /// Short label for display and log rows.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The outcome of one channel's send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub sent: bool,
    /// Delivery identifiers on success, or an error description on failure.
    pub detail: Option<String>,
}

impl ChannelOutcome {
    /// A successful send with the transport's delivery identifiers.
    pub fn sent(channel: Channel, ids: &[String]) -> Self {
        Self {
            channel,
            sent: true,
            detail: if ids.is_empty() {
                None
            } else {
                Some(ids.join(","))
            },
        }
    }

    /// A failed send with an error description.
    pub fn failed(channel: Channel, reason: impl Into<String>) -> Self {
        Self {
            channel,
            sent: false,
            detail: Some(reason.into()),
        }
    }
}

/// Per-channel results of one dispatch.
///
/// Partial failure is a first-class value here: a dispatch counts as
/// successful when at least one channel went through, and each channel's
/// failure is recorded rather than raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispatchResult {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchResult {
    /// True if at least one channel confirmed a send.
    pub fn any_sent(&self) -> bool {
        self.outcomes.iter().any(|o| o.sent)
    }

    /// True if every attempted channel confirmed a send.
    pub fn all_sent(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.sent)
    }

    /// True if some channels succeeded and some failed.
    pub fn is_partial(&self) -> bool {
        self.any_sent() && !self.all_sent()
    }

    /// The channels that confirmed a send.
    pub fn sent_channels(&self) -> Vec<Channel> {
        self.outcomes
            .iter()
            .filter(|o| o.sent)
            .map(|o| o.channel)
            .collect()
    }

    /// The outcome for one channel, if it was attempted.
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_success() {
        let result = DispatchResult {
            outcomes: vec![
                ChannelOutcome::sent(Channel::Sms, &["SM123".to_string()]),
                ChannelOutcome::failed(Channel::WhatsApp, "transport unavailable"),
            ],
        };
        assert!(result.any_sent());
        assert!(!result.all_sent());
        assert!(result.is_partial());
        assert_eq!(result.sent_channels(), vec![Channel::Sms]);
    }

    #[test]
    fn test_empty_result_is_not_success() {
        let result = DispatchResult::default();
        assert!(!result.any_sent());
        assert!(!result.all_sent());
        assert!(!result.is_partial());
    }

    #[test]
    fn test_outcome_lookup() {
        let result = DispatchResult {
            outcomes: vec![ChannelOutcome::sent(Channel::WhatsApp, &[])],
        };
        assert!(result.outcome(Channel::WhatsApp).is_some());
        assert!(result.outcome(Channel::Sms).is_none());
    }
}
