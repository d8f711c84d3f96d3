//! Report sources - where `report` reads its events from.
//!
//! The events file is JSON:
//!
//! ```text
//! {
//!   "channel_name": "police",
//!   "events": [
//!     {
//!       "event_name": "Grand theft",
//!       "city": "Springfield",
//!       "date_time": 1700000000,
//!       "description": "A red car was taken",
//!       "general_information": { "active": true, "forces_arrival_at_scene": false }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::event::Event;
use crate::transport::BoxFuture;

/// One event as read from a report source, before it has an owner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportRecord {
    #[serde(rename = "event_name")]
    pub name: String,
    pub city: String,
    pub date_time: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "stringify_values")]
    pub general_information: BTreeMap<String, String>,
}

impl ReportRecord {
    /// Attach the channel and reporting user.
    pub fn into_event(self, channel: &str, owner_user: &str) -> Event {
        Event::new(
            channel,
            owner_user,
            self.city,
            self.name,
            self.date_time,
            self.description,
            self.general_information,
        )
    }
}

/// Events for a single target channel, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportBatch {
    #[serde(rename = "channel_name")]
    pub channel: String,
    #[serde(default)]
    pub events: Vec<ReportRecord>,
}

impl ReportBatch {
    /// Parse the JSON events file format.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Loads a report batch from a path.
pub trait ReportSource: Send + Sync + 'static {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ReportBatch>>;
}

/// Reads JSON events files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportSource;

impl ReportSource for JsonReportSource {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ReportBatch>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(path).await?;
            let batch = ReportBatch::from_json(&text)?;
            tracing::debug!(
                "Loaded {} events for channel {} from {}",
                batch.events.len(),
                batch.channel,
                path.display()
            );
            Ok(batch)
        })
    }
}

fn stringify_values<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}
