//! Position-history ingest.
//!
//! Decodes the JSON array of position records served by the case backend
//! into [`Ping`]s. Timestamps may be RFC 3339 strings, naive
//! `YYYY-MM-DDTHH:MM:SS` strings (read as UTC) or integer Unix milliseconds.
//! Missing or null coordinates become `NaN`, so the ping is kept but skipped
//! by every geometric step.

use std::io::Read;

use chrono::{DateTime, NaiveDateTime};
use log::debug;
use serde::Deserialize;

use crate::error::{Result, TrackError};
use crate::Ping;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct PingRecord {
    id: i64,
    timestamp: RawTimestamp,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    stop_duration_minutes: Option<f64>,
}

/// Unix milliseconds from an RFC 3339 or naive UTC date-time string.
pub fn parse_timestamp_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

impl TryFrom<PingRecord> for Ping {
    type Error = TrackError;

    fn try_from(record: PingRecord) -> Result<Self> {
        let timestamp = match record.timestamp {
            RawTimestamp::Millis(ms) => ms,
            RawTimestamp::Text(text) => {
                parse_timestamp_ms(&text).ok_or(TrackError::InvalidTimestamp {
                    id: record.id,
                    value: text,
                })?
            }
        };

        Ok(Ping {
            id: record.id,
            timestamp,
            latitude: record.latitude.unwrap_or(f64::NAN),
            longitude: record.longitude.unwrap_or(f64::NAN),
            speed: record.speed,
            stop_duration_minutes: record.stop_duration_minutes,
        })
    }
}

fn into_pings(records: Vec<PingRecord>) -> Result<Vec<Ping>> {
    let pings = records
        .into_iter()
        .map(Ping::try_from)
        .collect::<Result<Vec<_>>>()?;
    debug!("[TrackEngine] ingested {} pings", pings.len());
    Ok(pings)
}

/// Decode a JSON array of position records. Order is preserved.
///
/// # Example
///
/// ```rust
/// use track_engine::ingest::parse_pings_json;
///
/// let json = r#"[
///     {"id": 1, "timestamp": "2024-03-01T10:00:00Z", "latitude": 40.4168, "longitude": -3.7038, "speed": 32.5},
///     {"id": 2, "timestamp": "2024-03-01T10:05:00", "latitude": null, "longitude": null},
///     {"id": 3, "timestamp": 1709287800000, "latitude": 40.42, "longitude": -3.70, "stop_duration_minutes": 12}
/// ]"#;
///
/// let pings = parse_pings_json(json).unwrap();
/// assert_eq!(pings.len(), 3);
/// assert_eq!(pings[0].speed, Some(32.5));
/// assert!(!pings[1].has_valid_coordinates());
/// assert!(pings[2].is_stop());
/// ```
pub fn parse_pings_json(json: &str) -> Result<Vec<Ping>> {
    let records: Vec<PingRecord> = serde_json::from_str(json)?;
    into_pings(records)
}

/// Like [`parse_pings_json`], reading from any byte source.
pub fn read_pings_json<R: Read>(reader: R) -> Result<Vec<Ping>> {
    let records: Vec<PingRecord> = serde_json::from_reader(reader)?;
    into_pings(records)
}
