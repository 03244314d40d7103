//! Point construction from parsed samples.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{ChannelDescriptor, PathContext, Point, Sample, MEASUREMENT};

/// Field key of a channel: `{channel_id}_{unit}`.
pub fn field_key(channel_id: &str, unit: &str) -> String {
    format!("{channel_id}_{unit}")
}

/// Groups valid samples into one [`Point`] per (timestamp, channel).
///
/// Samples for the same timestamp and channel collapse into a single point; the last value
/// pushed wins.
#[derive(Debug)]
pub struct PointBuilder<'a> {
    channels: &'a [ChannelDescriptor],
    base_tags: Vec<BTreeMap<String, String>>,
    values: BTreeMap<(DateTime<Utc>, usize), f64>,
}

impl<'a> PointBuilder<'a> {
    /// Create a builder for one file.
    pub fn new(channels: &'a [ChannelDescriptor], context: &PathContext, file_name: &str) -> Self {
        let base_tags = channels
            .iter()
            .map(|c| channel_tags(c, context, file_name))
            .collect();
        Self {
            channels,
            base_tags,
            values: BTreeMap::new(),
        }
    }

    /// Add samples; invalid ones are skipped.
    pub fn push<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        for s in samples {
            if s.valid && s.channel < self.channels.len() {
                self.values.insert((s.timestamp, s.channel), s.value);
            }
        }
    }

    /// Deduplicated `(channel index, value)` pairs, in point order.
    pub fn values(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().map(|(&(_, idx), &v)| (idx, v))
    }

    /// Number of points built so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Materialize points ordered by timestamp, then column.
    pub fn finish(self) -> Vec<Point> {
        let Self {
            channels,
            base_tags,
            values,
        } = self;

        values
            .into_iter()
            .map(|((timestamp, idx), value)| {
                let channel = &channels[idx];
                let mut point = Point::new(MEASUREMENT, timestamp).field(channel.field_key(), value);
                point.tags = base_tags[idx].clone();
                point
            })
            .collect()
    }
}

fn channel_tags(c: &ChannelDescriptor, ctx: &PathContext, file_name: &str) -> BTreeMap<String, String> {
    [
        ("campaign", ctx.campaign.as_str()),
        ("device_sn", c.device_sn.as_str()),
        ("device_master_sn", c.master_sn.as_str()),
        ("device_type", c.device_type.as_str()),
        ("device_subtype", c.device_role.as_str()),
        ("channel_id", c.channel_id.as_str()),
        ("channel_label", c.label.as_str()),
        ("channel_name", c.name.as_str()),
        ("channel_unit", c.unit.as_str()),
        ("file_name", file_name),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain(std::iter::once((
        "channel_number".to_string(),
        c.number.to_string(),
    )))
    .collect()
}
