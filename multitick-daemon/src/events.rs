use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events written to stdout, one JSON object per line
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum TickEvent {
    /// A tick received by one subscriber
    #[serde(rename = "tick")]
    Tick {
        subscriber: usize,
        timestamp: DateTime<Utc>,
        unix_nanos: i64,
    },

    /// Ticker statistics
    #[serde(rename = "stats")]
    Stats {
        dropped: u64,
        subscribers: usize,
        sampling_factor: u64,
    },
}

impl TickEvent {
    pub fn tick(subscriber: usize, timestamp: DateTime<Utc>) -> Self {
        Self::Tick {
            subscriber,
            timestamp,
            unix_nanos: timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX),
        }
    }

    /// Convert event to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}
