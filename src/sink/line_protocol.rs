//! InfluxDB line protocol encoding (second precision).
//!
//! ```text
//! measurement,tag=value,tag2=value2 field=1.5,count=3i 1754191200
//! ```

use std::fmt::Write as _;

use crate::types::{FieldValue, Point};

/// Encode one point. Returns `None` for a point without fields, which the protocol rejects.
///
/// Tags with an empty value are omitted.
pub fn encode_point(point: &Point) -> Option<String> {
    if point.fields.is_empty() {
        return None;
    }

    let mut line = escape(&point.measurement, &[',', ' ']);
    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        let _ = write!(
            line,
            ",{}={}",
            escape(key, &[',', '=', ' ']),
            escape(value, &[',', '=', ' '])
        );
    }

    line.push(' ');
    let mut first = true;
    for (key, value) in &point.fields {
        if !first {
            line.push(',');
        }
        first = false;
        let _ = write!(line, "{}=", escape(key, &[',', '=', ' ']));
        match value {
            FieldValue::Float(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::Integer(v) => {
                let _ = write!(line, "{v}i");
            }
            FieldValue::String(s) => {
                let _ = write!(line, "\"{}\"", escape(s, &['"', '\\']));
            }
        }
    }

    let _ = write!(line, " {}", point.timestamp.timestamp());
    Some(line)
}

/// Encode a batch, one line per point, skipping points without fields.
pub fn encode_points(points: &[Point]) -> String {
    let mut out = String::new();
    for line in points.iter().filter_map(encode_point) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
