//! Conflict event table: the historical anchors for window analysis
//!
//! Events are kept as an ordered list. Order is used for display only; the
//! analysis consumes events by name. At most one event may be flagged as the
//! live (`current`) event, which is excluded from historical aggregates.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RebasedWindow;

const COMMODITY_HISTORY_NOTE: &str =
    "Gold and oil futures history starts in 2000; commodity stats unavailable";

#[derive(Error, Debug)]
pub enum EventTableError {
    #[error("Duplicate event name: {0}")]
    DuplicateName(String),

    #[error("More than one event flagged as current: {0} and {1}")]
    MultipleCurrent(String, String),

    #[error("Failed to read event table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse event table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A named historical occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
    /// The live, still-unfolding event
    #[serde(default)]
    pub current: bool,
}

impl Event {
    pub fn new(name: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start_date,
            note: None,
            current: false,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn as_current(mut self) -> Self {
        self.current = true;
        self
    }
}

/// Display metadata for one event (name → start date + note)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMetadata {
    #[serde(skip)]
    pub name: String,
    pub start_date: NaiveDate,
    pub note: Option<String>,
}

/// Ordered, validated event table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventTable {
    events: Vec<Event>,
}

impl EventTable {
    pub fn new(events: Vec<Event>) -> Result<Self, EventTableError> {
        let mut seen = HashSet::new();
        let mut current: Option<&str> = None;
        for event in &events {
            if !seen.insert(event.name.as_str()) {
                return Err(EventTableError::DuplicateName(event.name.clone()));
            }
            if event.current {
                if let Some(first) = current {
                    return Err(EventTableError::MultipleCurrent(
                        first.to_string(),
                        event.name.clone(),
                    ));
                }
                current = Some(&event.name);
            }
        }
        Ok(Self { events })
    }

    /// Parse a JSON array of `{name, start_date, note?, current?}`
    pub fn from_json_str(json: &str) -> Result<Self, EventTableError> {
        let events: Vec<Event> = serde_json::from_str(json)?;
        Self::new(events)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EventTableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The built-in table of post-war conflicts
    pub fn builtin() -> Self {
        let events = vec![
            Event::new("Korean War (1950)", date(1950, 6, 25)).with_note(COMMODITY_HISTORY_NOTE),
            Event::new("Six-Day War (1967)", date(1967, 6, 5)).with_note(COMMODITY_HISTORY_NOTE),
            Event::new("Yom Kippur War (1973)", date(1973, 10, 6))
                .with_note(COMMODITY_HISTORY_NOTE),
            Event::new("Soviet-Afghan War (1979)", date(1979, 12, 24))
                .with_note(COMMODITY_HISTORY_NOTE),
            Event::new("Gulf War (1990)", date(1990, 8, 2)).with_note(COMMODITY_HISTORY_NOTE),
            Event::new("9/11 & Afghanistan (2001)", date(2001, 9, 11))
                .with_note("NYSE closed until 2001-09-17"),
            Event::new("Iraq War (2003)", date(2003, 3, 20)),
            Event::new("Crimea Annexation (2014)", date(2014, 2, 27)),
            Event::new("Russia-Ukraine War (2022)", date(2022, 2, 24)),
            Event::new("Israel-Hamas War (2023)", date(2023, 10, 7))
                .with_note("Started on a Saturday; first session 2023-10-09"),
            Event::new("Israel-Iran War (2025)", date(2025, 6, 13)).as_current(),
        ];
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    /// The live event, if one is flagged
    pub fn current(&self) -> Option<&Event> {
        self.events.iter().find(|e| e.current)
    }

    pub fn metadata(&self) -> Vec<EventMetadata> {
        self.events
            .iter()
            .map(|e| EventMetadata {
                name: e.name.clone(),
                start_date: e.start_date,
                note: e.note.clone(),
            })
            .collect()
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    // Literal dates in the built-in table are all valid calendar days.
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Ordered map serialization (name-keyed JSON objects in table order)
// ---------------------------------------------------------------------------

pub(crate) fn serialize_ordered_metadata<S: Serializer>(
    metadata: &[EventMetadata],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(metadata.len()))?;
    for m in metadata {
        map.serialize_entry(&m.name, m)?;
    }
    map.end()
}

pub(crate) fn serialize_ordered_windows<S: Serializer>(
    windows: &[RebasedWindow],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(windows.len()))?;
    for w in windows {
        map.serialize_entry(&w.event, w)?;
    }
    map.end()
}
