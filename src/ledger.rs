//! Event ledger - received events per (channel, user), kept in time order.
//!
//! Events are only ever added. A [`Summary`] is a snapshot of one entry with
//! the counts the summary file reports.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::{Local, TimeZone};

use crate::event::{Event, ACTIVE_KEY, FORCES_ARRIVAL_KEY};

/// Default `strftime` format for event times in summaries.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%y %H:%M";

/// Descriptions longer than this are truncated in summaries.
pub const SUMMARY_DESCRIPTION_LIMIT: usize = 27;

/// Ordered store of received events.
#[derive(Debug, Default)]
pub struct Ledger {
    channels: HashMap<String, HashMap<String, Vec<Event>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `event` under (channel, user), after any event with the same
    /// or an earlier time.
    pub fn insert(&mut self, channel: &str, user: &str, event: Event) {
        let events = self
            .channels
            .entry(channel.to_string())
            .or_default()
            .entry(user.to_string())
            .or_default();
        let index = events.partition_point(|e| e.date_time() <= event.date_time());
        events.insert(index, event);
    }

    /// Events for (channel, user) in time order.
    pub fn events(&self, channel: &str, user: &str) -> &[Event] {
        self.channels
            .get(channel)
            .and_then(|users| users.get(user))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of stored events.
    pub fn len(&self) -> usize {
        self.channels
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot one entry with its counts. Unknown keys give an empty summary.
    pub fn summarize(&self, channel: &str, user: &str) -> Summary {
        let events = self.events(channel, user).to_vec();
        Summary {
            channel: channel.to_string(),
            total: events.len(),
            active: events.iter().filter(|e| e.flag(ACTIVE_KEY)).count(),
            forces_arrival: events.iter().filter(|e| e.flag(FORCES_ARRIVAL_KEY)).count(),
            events,
        }
    }
}

/// Counts and events for one (channel, user) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub channel: String,
    pub total: usize,
    pub active: usize,
    pub forces_arrival: usize,
    pub events: Vec<Event>,
}

impl Summary {
    /// Render the summary file text.
    pub fn render(&self, date_format: &str) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_report(&mut out, date_format);
        out
    }

    fn write_report(&self, out: &mut String, date_format: &str) -> std::fmt::Result {
        writeln!(out, "Channel {}", self.channel)?;
        writeln!(out, "Stats:")?;
        writeln!(out, "Total: {}", self.total)?;
        writeln!(out, "active: {}", self.active)?;
        writeln!(out, "forces arrival at scene: {}", self.forces_arrival)?;
        writeln!(out, "Event Reports:")?;

        for (i, event) in self.events.iter().enumerate() {
            writeln!(out, "Report_{}:", i + 1)?;
            writeln!(out, "city: {}", event.city())?;
            writeln!(
                out,
                "date time: {}",
                format_date_time(event.date_time(), date_format)
            )?;
            writeln!(out, "event name: {}", event.name())?;
            writeln!(out, "summary: {}", truncate_description(event.description()))?;
        }
        Ok(())
    }
}

/// Render epoch seconds in local time.
///
/// Falls back to the raw number when the time is out of range or the format
/// string is invalid.
pub fn format_date_time(epoch_seconds: i64, date_format: &str) -> String {
    let Some(local) = Local.timestamp_opt(epoch_seconds, 0).single() else {
        return epoch_seconds.to_string();
    };
    let mut rendered = String::new();
    match write!(rendered, "{}", local.format(date_format)) {
        Ok(()) => rendered,
        Err(_) => epoch_seconds.to_string(),
    }
}

/// First 27 characters plus `...` when longer, unchanged otherwise.
pub fn truncate_description(description: &str) -> String {
    match description.char_indices().nth(SUMMARY_DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{}...", &description[..cut]),
        None => description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn event(user: &str, date_time: i64, name: &str, info: &[(&str, &str)]) -> Event {
        let info: BTreeMap<String, String> = info
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Event::new("sports", user, "Tel Aviv", name, date_time, "desc", info)
    }

    fn times(events: &[Event]) -> Vec<i64> {
        events.iter().map(Event::date_time).collect()
    }

    #[test]
    fn test_insert_keeps_time_order() {
        let mut ledger = Ledger::new();
        for t in [1000, 500, 750, 2000, 0] {
            ledger.insert("sports", "bob", event("bob", t, "e", &[]));
        }
        assert_eq!(times(ledger.events("sports", "bob")), vec![0, 500, 750, 1000, 2000]);
        assert_eq!(ledger.len(), 5);
    }

    #[test]
    fn test_equal_times_keep_arrival_order() {
        let mut ledger = Ledger::new();
        ledger.insert("sports", "bob", event("bob", 10, "first", &[]));
        ledger.insert("sports", "bob", event("bob", 5, "early", &[]));
        ledger.insert("sports", "bob", event("bob", 10, "second", &[]));
        ledger.insert("sports", "bob", event("bob", 10, "third", &[]));

        let names: Vec<&str> = ledger.events("sports", "bob").iter().map(Event::name).collect();
        assert_eq!(names, vec!["early", "first", "second", "third"]);
    }

    #[test]
    fn test_entries_are_separate_per_channel_and_user() {
        let mut ledger = Ledger::new();
        ledger.insert("sports", "bob", event("bob", 1, "a", &[]));
        ledger.insert("sports", "carol", event("carol", 2, "b", &[]));
        ledger.insert("police", "bob", event("bob", 3, "c", &[]));

        assert_eq!(ledger.events("sports", "bob").len(), 1);
        assert_eq!(ledger.events("sports", "carol").len(), 1);
        assert_eq!(ledger.events("police", "bob").len(), 1);
        assert!(ledger.events("police", "carol").is_empty());
        assert!(ledger.events("weather", "bob").is_empty());
    }

    #[test]
    fn test_summarize_counts() {
        let mut ledger = Ledger::new();
        ledger.insert("sports", "bob", event("bob", 1, "a", &[("active", "true")]));
        ledger.insert(
            "sports",
            "bob",
            event("bob", 2, "b", &[("active", "false"), ("forces_arrival_at_scene", "true")]),
        );
        ledger.insert(
            "sports",
            "bob",
            event("bob", 3, "c", &[("active", "true"), ("forces_arrival_at_scene", "true")]),
        );
        ledger.insert("sports", "bob", event("bob", 4, "d", &[("active", "yes")]));

        let summary = ledger.summarize("sports", "bob");
        assert_eq!(summary.total, 4);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.forces_arrival, 2);
        assert_eq!(times(&summary.events), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_summarize_unknown_entry_is_empty() {
        let summary = Ledger::new().summarize("nowhere", "nobody");
        assert_eq!(summary.total, 0);
        assert_eq!(summary.active, 0);
        assert_eq!(summary.forces_arrival, 0);
        assert!(summary.events.is_empty());
    }

    #[test]
    fn test_truncate_description() {
        assert_eq!(truncate_description("short"), "short");
        let exact = "a".repeat(27);
        assert_eq!(truncate_description(&exact), exact);
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(truncate_description(long), "abcdefghijklmnopqrstuvwxyz0...");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "é".repeat(30);
        assert_eq!(truncate_description(&text), format!("{}...", "é".repeat(27)));
    }

    #[test]
    fn test_format_date_time_uses_local_time() {
        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap()
            .format(DEFAULT_DATE_FORMAT)
            .to_string();
        assert_eq!(format_date_time(1_700_000_000, DEFAULT_DATE_FORMAT), expected);
    }

    #[test]
    fn test_format_date_time_out_of_range_falls_back() {
        assert_eq!(format_date_time(i64::MAX, DEFAULT_DATE_FORMAT), i64::MAX.to_string());
    }

    #[test]
    fn test_render_layout() {
        let mut ledger = Ledger::new();
        let long = "The crowd stormed the field after the final whistle";
        ledger.insert(
            "sports",
            "bob",
            Event::new("sports", "bob", "Haifa", "riot", 1000, long, BTreeMap::new()),
        );
        ledger.insert(
            "sports",
            "bob",
            Event::new("sports", "bob", "Eilat", "goal", 500, "late goal", BTreeMap::new()),
        );

        let text = ledger.summarize("sports", "bob").render(DEFAULT_DATE_FORMAT);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            &lines[..6],
            &[
                "Channel sports",
                "Stats:",
                "Total: 2",
                "active: 0",
                "forces arrival at scene: 0",
                "Event Reports:",
            ]
        );
        assert_eq!(lines[6], "Report_1:");
        assert_eq!(lines[7], "city: Eilat");
        assert_eq!(lines[8], format!("date time: {}", format_date_time(500, DEFAULT_DATE_FORMAT)));
        assert_eq!(lines[9], "event name: goal");
        assert_eq!(lines[10], "summary: late goal");
        assert_eq!(lines[11], "Report_2:");
        assert_eq!(lines[15], "summary: The crowd stormed the field...");
        assert_eq!(lines.len(), 16);
    }
}
