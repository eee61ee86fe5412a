//! WhatsApp sending via Twilio.
//!
//! Destinations and the From number must carry the `whatsapp:` prefix;
//! bare numbers are normalized. The default From is the Twilio sandbox
//! number.

use wavewatch_types::Channel;

use crate::twilio::{split_targets, SenderId, TwilioClient};
use crate::AdapterError;

/// Twilio WhatsApp sandbox sender.
const SANDBOX_FROM: &str = "whatsapp:+14155238886";

/// Sends one WhatsApp message per configured destination.
#[derive(Debug, Clone)]
pub struct WhatsAppSender {
    client: TwilioClient,
    from: String,
    to: Vec<String>,
}

impl WhatsAppSender {
    /// Create a sender with an explicit From number and destination list.
    pub fn new(
        client: TwilioClient,
        from: impl AsRef<str>,
        to: impl AsRef<str>,
    ) -> Result<Self, AdapterError> {
        let to: Vec<String> = split_targets(to.as_ref())
            .into_iter()
            .map(|t| normalize(&t))
            .collect();
        if to.is_empty() {
            return Err(AdapterError::Config(
                "Empty WhatsApp destination list; set WHATSAPP_TO or pass destinations"
                    .to_string(),
            ));
        }
        Ok(Self {
            client,
            from: normalize(from.as_ref()),
            to,
        })
    }

    /// Build a sender from the environment: `TWILIO_WHATSAPP_FROM`
    /// (sandbox default) and `WHATSAPP_TO`.
    pub fn from_env(client: TwilioClient) -> Result<Self, AdapterError> {
        let from =
            std::env::var("TWILIO_WHATSAPP_FROM").unwrap_or_else(|_| SANDBOX_FROM.to_string());
        let to = std::env::var("WHATSAPP_TO").unwrap_or_default();
        Self::new(client, from, to)
    }

    /// Send `body` to every destination; returns one SID per message.
    pub async fn send(&self, body: &str) -> Result<Vec<String>, AdapterError> {
        let sender = SenderId::From(self.from.clone());
        let mut sids = Vec::with_capacity(self.to.len());
        for dest in &self.to {
            let sid = self.client.send_message(&sender, dest, body).await?;
            sids.push(sid);
        }
        Ok(sids)
    }

    /// The notification channel this sender serves.
    pub fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    /// The configured destinations, all `whatsapp:`-prefixed.
    pub fn destinations(&self) -> &[String] {
        &self.to
    }
}

fn normalize(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TwilioClient {
        TwilioClient::builder().credentials("AC123", "token").build()
    }

    #[test]
    fn test_normalize_adds_prefix() {
        assert_eq!(normalize("+62811"), "whatsapp:+62811");
        assert_eq!(normalize("whatsapp:+62811"), "whatsapp:+62811");
    }

    #[test]
    fn test_new_normalizes_destinations() {
        let sender =
            WhatsAppSender::new(client(), "+14155238886", "+62811,whatsapp:+62812").unwrap();
        assert_eq!(
            sender.destinations(),
            ["whatsapp:+62811", "whatsapp:+62812"]
        );
        assert_eq!(sender.channel(), Channel::WhatsApp);
    }

    #[test]
    fn test_new_rejects_empty_destinations() {
        let err = WhatsAppSender::new(client(), SANDBOX_FROM, "").unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }
}
