//! # wavewatch-adapters
//!
//! Clients for the external services the wavewatch engine talks to.
//!
//! ## Supported Services
//!
//! - **Twilio** (`twilio` feature) - Sends SMS and WhatsApp messages via the
//!   Twilio Messages API, returning one delivery SID per destination
//! - **BMKG** (`bmkg` feature) - Fetches the latest and recent earthquakes
//!   from the Indonesian meteorological agency's public feed
//!
//! ## Quick Start (BMKG)
//!
//! ```rust,no_run
//! use wavewatch_adapters::bmkg::BmkgClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BmkgClient::builder().build();
//!
//!     let quake = client.latest().await?;
//!     println!("M{} at {}", quake.magnitude, quake.region);
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "twilio")]
pub mod twilio;

#[cfg(feature = "twilio")]
pub mod sms;

#[cfg(feature = "twilio")]
pub mod whatsapp;

#[cfg(feature = "bmkg")]
pub mod bmkg;

pub use error::AdapterError;
