//! Row parsing: one tab-separated data line to timestamped [`Sample`]s.
//!
//! Failures never escalate past this module. A bad timestamp drops the whole row; a bad cell
//! drops only that channel's value for that row. Both are counted in [`RowCounters`].

use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ChannelDescriptor, Sample};

/// Timestamp layout of column 0: `day/month/2-digit-year hour:minute:second`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M:%S";

/// Per-file row statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounters {
    /// Data rows seen, valid or not.
    pub rows: usize,
    /// Rows dropped because column 0 is not a valid timestamp.
    pub invalid_timestamps: usize,
    /// Individual cells dropped because they are missing or not a finite number.
    pub invalid_values: usize,
}

/// Parse a column-0 timestamp. The value is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Parse a measurement cell as a finite decimal.
pub fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse one data record against the channel mapping.
///
/// Returns one sample per channel (invalid cells yield `valid == false`), or nothing when the
/// timestamp is unusable.
pub fn parse_row(
    record: &StringRecord,
    channels: &[ChannelDescriptor],
    counters: &mut RowCounters,
) -> Vec<Sample> {
    counters.rows += 1;
    let row = counters.rows;

    let raw_ts = record.get(0).unwrap_or("");
    let Some(timestamp) = parse_timestamp(raw_ts) else {
        counters.invalid_timestamps += 1;
        warn!(row, raw = raw_ts, "could not parse timestamp, row dropped");
        return Vec::new();
    };

    channels
        .iter()
        .enumerate()
        .map(|(idx, channel)| {
            let raw = record.get(channel.column).unwrap_or("");
            match parse_value(raw) {
                Some(value) => Sample {
                    timestamp,
                    channel: idx,
                    value,
                    valid: true,
                },
                None => {
                    counters.invalid_values += 1;
                    warn!(
                        row,
                        column = channel.column,
                        channel = %channel.channel_id,
                        raw,
                        "invalid value, sample dropped"
                    );
                    Sample {
                        timestamp,
                        channel: idx,
                        value: f64::NAN,
                        valid: false,
                    }
                }
            }
        })
        .collect()
}

/// Convenience wrapper over [`parse_row`] for a raw tab-separated line.
pub fn parse_line(
    line: &str,
    channels: &[ChannelDescriptor],
    counters: &mut RowCounters,
) -> Vec<Sample> {
    let record = StringRecord::from(line.trim_end_matches(['\r', '\n']).split('\t').collect::<Vec<_>>());
    parse_row(&record, channels, counters)
}
