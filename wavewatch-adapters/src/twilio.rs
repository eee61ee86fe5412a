//! Twilio Messages API client.
//!
//! Shared by the SMS and WhatsApp senders. Sends one message per
//! destination via the REST API and returns the message SID Twilio
//! assigns, which callers surface as the delivery identifier.
//!
//! Credentials come from the builder or from `TWILIO_ACCOUNT_SID` /
//! `TWILIO_AUTH_TOKEN` in the environment; credential storage itself is
//! out of scope here.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::AdapterError;

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// How the sender side of a message is identified.
#[derive(Debug, Clone)]
pub enum SenderId {
    /// A concrete From number (E.164, or `whatsapp:+...`).
    From(String),
    /// A Twilio Messaging Service SID, preferred for production SMS.
    MessagingService(String),
}

/// Low-level Twilio Messages API client.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> TwilioClientBuilder {
        TwilioClientBuilder::default()
    }

    /// Build a client from `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, AdapterError> {
        let sid = std::env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| AdapterError::Config("TWILIO_ACCOUNT_SID is not set".to_string()))?;
        let token = std::env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| AdapterError::Config("TWILIO_AUTH_TOKEN is not set".to_string()))?;
        Ok(Self::builder().credentials(sid, token).build())
    }

    /// Send one message and return its SID.
    pub async fn send_message(
        &self,
        sender: &SenderId,
        to: &str,
        body: &str,
    ) -> Result<String, AdapterError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );

        let mut form: Vec<(&str, &str)> = vec![("To", to), ("Body", body)];
        match sender {
            SenderId::From(from) => form.push(("From", from)),
            SenderId::MessagingService(msid) => form.push(("MessagingServiceSid", msid)),
        }

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth("Invalid Twilio credentials".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<TwilioErrorBody>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_default();
            return Err(AdapterError::Http(format!(
                "Twilio API returned status {status}: {detail}"
            )));
        }

        let created: MessageCreated = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(created.sid)
    }

    /// The account SID this client authenticates as.
    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }
}

/// Builder for [`TwilioClient`].
#[derive(Debug, Default)]
pub struct TwilioClientBuilder {
    base_url: Option<String>,
    account_sid: Option<String>,
    auth_token: Option<String>,
    timeout: Option<Duration>,
}

impl TwilioClientBuilder {
    /// Set the account SID and auth token.
    pub fn credentials(
        mut self,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        self.account_sid = Some(account_sid.into());
        self.auth_token = Some(auth_token.into());
        self
    }

    /// Override the API base URL (useful for tests against a local stub).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> TwilioClient {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        TwilioClient {
            client,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            account_sid: self.account_sid.unwrap_or_default(),
            auth_token: self.auth_token.unwrap_or_default(),
        }
    }
}

/// Destination list helper shared by the SMS and WhatsApp senders.
///
/// Accepts a single value or a comma-separated list; empty entries are
/// dropped. An empty result is a configuration error surfaced by the
/// senders, not here.
pub(crate) fn split_targets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = TwilioClient::builder().build();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.account_sid(), "");
    }

    #[test]
    fn test_builder_custom() {
        let client = TwilioClient::builder()
            .credentials("AC123", "secret")
            .base_url("http://localhost:8080")
            .build();
        assert_eq!(client.account_sid(), "AC123");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_split_targets() {
        assert_eq!(split_targets("+62811"), vec!["+62811"]);
        assert_eq!(
            split_targets("+62811, +62812 ,,"),
            vec!["+62811", "+62812"]
        );
        assert!(split_targets("  ").is_empty());
    }
}
