//! Event records and their textual message body.
//!
//! A report is published as the body of a SEND frame and comes back to every
//! subscriber as a MESSAGE body:
//!
//! ```text
//! user:alice
//! channel name:police
//! city:Springfield
//! event name:Grand theft
//! date time:1700000000
//! general information:
//! 	active:true
//! 	forces_arrival_at_scene:false
//! description:
//! A red car was taken from the parking lot
//! ```

use std::collections::BTreeMap;

use crate::error::{Result, StompError};

mod keys {
    pub const USER: &str = "user";
    pub const CHANNEL: &str = "channel name";
    pub const CITY: &str = "city";
    pub const EVENT_NAME: &str = "event name";
    pub const DATE_TIME: &str = "date time";
    pub const GENERAL_INFORMATION: &str = "general information";
    pub const DESCRIPTION: &str = "description";
}

/// General information key counted as "active" in summaries.
pub const ACTIVE_KEY: &str = "active";

/// General information key counted as "forces arrival at scene" in summaries.
pub const FORCES_ARRIVAL_KEY: &str = "forces_arrival_at_scene";

/// A single reported event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    channel: String,
    owner_user: String,
    city: String,
    name: String,
    date_time: i64,
    description: String,
    general_information: BTreeMap<String, String>,
}

impl Event {
    pub fn new(
        channel: impl Into<String>,
        owner_user: impl Into<String>,
        city: impl Into<String>,
        name: impl Into<String>,
        date_time: i64,
        description: impl Into<String>,
        general_information: BTreeMap<String, String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            owner_user: owner_user.into(),
            city: city.into(),
            name: name.into(),
            date_time,
            description: description.into(),
            general_information,
        }
    }

    #[inline]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[inline]
    pub fn owner_user(&self) -> &str {
        &self.owner_user
    }

    #[inline]
    pub fn city(&self) -> &str {
        &self.city
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event time in epoch seconds.
    #[inline]
    pub fn date_time(&self) -> i64 {
        self.date_time
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn general_information(&self) -> &BTreeMap<String, String> {
        &self.general_information
    }

    /// Whether a general information entry is exactly `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.general_information.get(key).map(String::as_str) == Some("true")
    }

    /// Render the SEND body for this event.
    pub fn to_report_body(&self) -> String {
        let mut body = String::new();
        push_field(&mut body, keys::USER, &self.owner_user);
        push_field(&mut body, keys::CHANNEL, &self.channel);
        push_field(&mut body, keys::CITY, &self.city);
        push_field(&mut body, keys::EVENT_NAME, &self.name);
        push_field(&mut body, keys::DATE_TIME, &self.date_time.to_string());
        body.push_str(keys::GENERAL_INFORMATION);
        body.push_str(":\n");
        for (key, value) in &self.general_information {
            body.push('\t');
            push_field(&mut body, key, value);
        }
        body.push_str(keys::DESCRIPTION);
        body.push_str(":\n");
        body.push_str(&self.description);
        body
    }

    /// Parse a MESSAGE body.
    ///
    /// `fallback_channel` (usually the frame's `destination`) is used when the
    /// body carries no `channel name` line. Unknown keys and lines without a
    /// colon are ignored.
    pub fn from_message_body(body: &str, fallback_channel: Option<&str>) -> Result<Self> {
        let mut channel = None;
        let mut owner_user = None;
        let mut city = String::new();
        let mut name = String::new();
        let mut date_time = None;
        let mut description = String::new();
        let mut general_information = BTreeMap::new();
        let mut in_general_information = false;

        let mut lines = body.lines();
        while let Some(line) = lines.next() {
            if in_general_information && line.starts_with(['\t', ' ']) {
                if let Some((key, value)) = line.trim_start().split_once(':') {
                    general_information.insert(key.trim().to_string(), value.trim().to_string());
                }
                continue;
            }
            in_general_information = false;

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                keys::USER => owner_user = Some(value.to_string()),
                keys::CHANNEL => channel = Some(value.to_string()),
                keys::CITY => city = value.to_string(),
                keys::EVENT_NAME => name = value.to_string(),
                keys::DATE_TIME => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        StompError::MalformedEvent(format!("invalid date time {:?}", value))
                    })?;
                    date_time = Some(parsed);
                }
                keys::GENERAL_INFORMATION => in_general_information = true,
                keys::DESCRIPTION => {
                    let mut parts: Vec<&str> = Vec::new();
                    if !value.is_empty() {
                        parts.push(value);
                    }
                    parts.extend(lines.by_ref());
                    description = parts.join("\n").trim_end_matches('\n').to_string();
                    break;
                }
                _ => {}
            }
        }

        let owner_user =
            owner_user.ok_or_else(|| StompError::MalformedEvent("missing user".into()))?;
        let channel = channel
            .filter(|c| !c.is_empty())
            .or_else(|| fallback_channel.map(str::to_string))
            .ok_or_else(|| StompError::MalformedEvent("missing channel name".into()))?;
        let date_time =
            date_time.ok_or_else(|| StompError::MalformedEvent("missing date time".into()))?;

        Ok(Self {
            channel,
            owner_user,
            city,
            name,
            date_time,
            description,
            general_information,
        })
    }
}

fn push_field(body: &mut String, key: &str, value: &str) {
    body.push_str(key);
    body.push(':');
    body.push_str(value);
    body.push('\n');
}
