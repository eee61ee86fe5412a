//! SMS sending via Twilio.
//!
//! Prefers a Messaging Service SID when one is configured and falls back
//! to a plain From number. Destinations are E.164 strings; a single value
//! or a comma-separated list is accepted.

use wavewatch_types::Channel;

use crate::twilio::{split_targets, SenderId, TwilioClient};
use crate::AdapterError;

/// Sends one SMS per configured destination.
#[derive(Debug, Clone)]
pub struct SmsSender {
    client: TwilioClient,
    sender: SenderId,
    to: Vec<String>,
}

impl SmsSender {
    /// Create a sender with an explicit sender id and destination list.
    pub fn new(
        client: TwilioClient,
        sender: SenderId,
        to: impl AsRef<str>,
    ) -> Result<Self, AdapterError> {
        let to = split_targets(to.as_ref());
        if to.is_empty() {
            return Err(AdapterError::Config(
                "Empty SMS destination list; set SMS_TO or pass destinations".to_string(),
            ));
        }
        Ok(Self { client, sender, to })
    }

    /// Build a sender from the environment:
    /// `TWILIO_MESSAGING_SERVICE_SID` or `TWILIO_SMS_FROM` for the sender
    /// side, `SMS_TO` for the destinations.
    pub fn from_env(client: TwilioClient) -> Result<Self, AdapterError> {
        let sender = match std::env::var("TWILIO_MESSAGING_SERVICE_SID") {
            Ok(msid) if !msid.trim().is_empty() => SenderId::MessagingService(msid),
            _ => match std::env::var("TWILIO_SMS_FROM") {
                Ok(from) if !from.trim().is_empty() => SenderId::From(from),
                _ => {
                    return Err(AdapterError::Config(
                        "Either TWILIO_MESSAGING_SERVICE_SID or TWILIO_SMS_FROM must be set"
                            .to_string(),
                    ))
                }
            },
        };
        let to = std::env::var("SMS_TO").unwrap_or_default();
        Self::new(client, sender, to)
    }

    /// Send `body` to every destination; returns one SID per message.
    ///
    /// Stops at the first transport error - the caller records the failure
    /// for this channel and the other channel is unaffected.
    pub async fn send(&self, body: &str) -> Result<Vec<String>, AdapterError> {
        let mut sids = Vec::with_capacity(self.to.len());
        for dest in &self.to {
            let sid = self.client.send_message(&self.sender, dest, body).await?;
            sids.push(sid);
        }
        Ok(sids)
    }

    /// The notification channel this sender serves.
    pub fn channel(&self) -> Channel {
        Channel::Sms
    }

    /// The configured destinations.
    pub fn destinations(&self) -> &[String] {
        &self.to
    }
}
