//! BMKG earthquake feed client.
//!
//! Fetches earthquake reports from the public feed of BMKG (the Indonesian
//! meteorology, climatology, and geophysics agency):
//!
//! - `autogempa.json` - the single most recent event
//! - `gempaterkini.json` - the recent M5+ list
//!
//! The engine only classifies the magnitude; every other field is passed
//! through as an opaque payload for the alert record.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::AdapterError;

const DEFAULT_BASE_URL: &str = "https://data.bmkg.go.id/DataMKG/TEWS";

/// Seconds east of UTC for Western Indonesian Time, the feed's local zone.
const WIB_OFFSET_SECS: i32 = 7 * 3600;

/// One parsed earthquake report.
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeEvent {
    /// Local date and time as reported, e.g. `"15 Jan 2024 14:30:25 WIB"`.
    pub datetime: String,
    /// Event time resolved to UTC, when the feed's timestamp parses.
    pub occurred_at: Option<DateTime<Utc>>,
    pub magnitude: f64,
    /// Depth as reported, e.g. `"10 km"`.
    pub depth: String,
    /// Free-text region, e.g. `"Laut Banda, Maluku"`.
    pub region: String,
    /// Raw coordinate string, e.g. `"4.5 LS, 129.2 BT"`.
    pub coordinates: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Tsunami potential as reported, free text.
    pub tsunami_potential: String,
    /// Where the quake was felt, free text; often empty.
    pub felt: String,
}

/// Client for the BMKG earthquake feed.
#[derive(Debug, Clone)]
pub struct BmkgClient {
    client: Client,
    base_url: String,
}

impl BmkgClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> BmkgClientBuilder {
        BmkgClientBuilder::default()
    }

    /// Fetch the single most recent earthquake.
    pub async fn latest(&self) -> Result<QuakeEvent, AdapterError> {
        let url = format!("{}/autogempa.json", self.base_url);
        let envelope: Envelope<RawQuake> = self.fetch(&url).await?;
        parse_quake(&envelope.info.gempa)
    }

    /// Fetch the recent earthquake list, newest first, truncated to `limit`.
    pub async fn recent(&self, limit: usize) -> Result<Vec<QuakeEvent>, AdapterError> {
        let url = format!("{}/gempaterkini.json", self.base_url);
        let envelope: Envelope<Vec<RawQuake>> = self.fetch(&url).await?;
        let mut events = Vec::new();
        for raw in envelope.info.gempa.iter().take(limit) {
            events.push(parse_quake(raw)?);
        }
        Ok(events)
    }

    /// Fetch recent earthquakes that occurred within the last `hours`.
    ///
    /// Events whose timestamp does not parse are excluded.
    pub async fn history(&self, hours: u64) -> Result<Vec<QuakeEvent>, AdapterError> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        let events = self.recent(50).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.occurred_at.is_some_and(|t| t >= cutoff))
            .collect())
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, AdapterError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AdapterError::Http(format!(
                "Feed returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }
}

/// Builder for [`BmkgClient`].
#[derive(Debug, Default)]
pub struct BmkgClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl BmkgClientBuilder {
    /// Override the feed base URL (useful for tests against a local stub).
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
    pub fn build(self) -> BmkgClient {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        BmkgClient {
            client,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

/// The feed wraps both endpoints in `{"Infogempa": {"gempa": ...}}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Infogempa")]
    info: InfoGempa<T>,
}

#[derive(Debug, Deserialize)]
struct InfoGempa<T> {
    gempa: T,
}

#[derive(Debug, Deserialize)]
struct RawQuake {
    #[serde(rename = "Tanggal", default)]
    date: String,
    #[serde(rename = "Jam", default)]
    time: String,
    #[serde(rename = "DateTime", default)]
    datetime_utc: String,
    #[serde(rename = "Magnitude", default)]
    magnitude: String,
    #[serde(rename = "Kedalaman", default)]
    depth: String,
    #[serde(rename = "Wilayah", default)]
    region: String,
    #[serde(rename = "Coordinates", default)]
    coordinates: String,
    #[serde(rename = "Potensi", default)]
    potential: String,
    #[serde(rename = "Dirasakan", default)]
    felt: String,
}

fn parse_quake(raw: &RawQuake) -> Result<QuakeEvent, AdapterError> {
    let magnitude: f64 = raw
        .magnitude
        .trim()
        .parse()
        .map_err(|_| AdapterError::Parse(format!("Bad magnitude: {:?}", raw.magnitude)))?;

    let (latitude, longitude) = parse_coordinates(&raw.coordinates);

    Ok(QuakeEvent {
        datetime: format!("{} {}", raw.date.trim(), raw.time.trim())
            .trim()
            .to_string(),
        occurred_at: parse_occurred_at(&raw.datetime_utc, &raw.time),
        magnitude,
        depth: raw.depth.clone(),
        region: raw.region.clone(),
        coordinates: raw.coordinates.clone(),
        latitude,
        longitude,
        tsunami_potential: raw.potential.clone(),
        felt: raw.felt.clone(),
    })
}

/// Resolve the event time to UTC.
///
/// Prefers the feed's RFC 3339 `DateTime`; falls back to the local
/// `Jam` field's `"HH:MM:SS WIB"` shape combined with today's date,
/// which is good enough for history filtering when `DateTime` is absent.
fn parse_occurred_at(datetime_utc: &str, local_time: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::<FixedOffset>::parse_from_rfc3339(datetime_utc.trim()) {
        return Some(ts.with_timezone(&Utc));
    }

    let wib = FixedOffset::east_opt(WIB_OFFSET_SECS)?;
    let clock = local_time.trim().trim_end_matches(" WIB");
    let today = Utc::now().with_timezone(&wib).date_naive();
    let naive: Option<NaiveDateTime> = chrono::NaiveTime::parse_from_str(clock, "%H:%M:%S")
        .ok()
        .map(|t| today.and_time(t));
    naive
        .and_then(|n| wib.from_local_datetime(&n).single())
        .map(|t| t.with_timezone(&Utc))
}

/// Parse the feed's `"1.23 LS, 123.45 BT"` coordinate format.
///
/// LS (south) and BB (west) are negative; unparseable input yields
/// `(0.0, 0.0)` like an absent reading.
fn parse_coordinates(coordinates: &str) -> (f64, f64) {
    let cleaned = coordinates
        .replace("LS", "")
        .replace("LU", "")
        .replace("BT", "")
        .replace("BB", "");
    let parts: Vec<&str> = cleaned.split(',').collect();
    if parts.len() < 2 {
        return (0.0, 0.0);
    }

    let lat: f64 = match parts[0].trim().parse() {
        Ok(v) => v,
        Err(_) => return (0.0, 0.0),
    };
    let lon: f64 = match parts[1].trim().parse() {
        Ok(v) => v,
        Err(_) => return (0.0, 0.0),
    };

    let lat = if coordinates.contains("LS") { -lat } else { lat };
    let lon = if coordinates.contains("BB") { -lon } else { lon };
    (lat, lon)
}
