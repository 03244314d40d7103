//! Channel mapping: header lines to [`ChannelDescriptor`]s.
//!
//! Labels look like `Ph 1 V` or `Voie1 W`: the trailing token is the unit, the rest is the
//! channel name. A name of the form `Ph<n>` is a phase marker; any marker for phase 2 or 3
//! makes the whole device set [`DeviceType::ThreePhase`].

use std::collections::{HashMap, HashSet};

use crate::error::{IngestError, IngestResult};
use crate::types::{ChannelDescriptor, DeviceRole, DeviceType};

use super::format::{FileFormat, FileHeader, HeaderLines};

/// Derive the ordered channel list for a detected header.
///
/// One descriptor per non-timestamp column, in column order.
pub fn map_channels(header: &FileHeader) -> IngestResult<Vec<ChannelDescriptor>> {
    let channels = match (header.format, &header.lines) {
        (FileFormat::MvT302V002, HeaderLines::TwoLine { serials, labels }) => {
            map_two_line(serials, labels)?
        }
        (FileFormat::MvT302V003, HeaderLines::MetadataBlock { metadata, labels }) => {
            let master = metadata
                .get("master")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| IngestError::malformed_header("metadata block has no Master serial"))?;
            map_metadata_block(master, labels)?
        }
        (format, _) => {
            return Err(IngestError::malformed_header(format!(
                "header layout does not match format {format}"
            )));
        }
    };

    ensure_unique_ids(&channels)?;
    Ok(channels)
}

fn map_two_line(serials: &[String], labels: &[String]) -> IngestResult<Vec<ChannelDescriptor>> {
    if serials.len() != labels.len() {
        return Err(IngestError::malformed_header(format!(
            "device line has {} columns but label line has {}",
            serials.len(),
            labels.len()
        )));
    }
    if labels.len() < 2 {
        return Err(IngestError::malformed_header("no data columns"));
    }

    let master = serials[0].as_str();
    if master.is_empty() {
        return Err(IngestError::malformed_header("missing master serial in column 0"));
    }

    let parsed = labels[1..]
        .iter()
        .enumerate()
        .map(|(i, label)| split_label(i + 1, label))
        .collect::<IngestResult<Vec<_>>>()?;
    let device_type = topology(parsed.iter().map(|(name, _)| name.as_str()));

    let mut counters: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::with_capacity(parsed.len());
    for (i, (name, unit)) in parsed.into_iter().enumerate() {
        let column = i + 1;
        let device_sn = serials[column].as_str();
        if device_sn.is_empty() {
            return Err(IngestError::malformed_header(format!(
                "missing device serial for column {column}"
            )));
        }

        let number = {
            let n = counters.entry(device_sn).or_insert(0);
            *n += 1;
            *n
        };
        let role = role_of(device_sn, master);
        let channel_id = format!("{}{device_sn}_Ch{number}_M{master}", role.prefix());

        out.push(ChannelDescriptor {
            column,
            channel_id,
            unit,
            label: labels[column].clone(),
            name,
            number,
            device_type,
            device_role: role,
            master_sn: master.to_string(),
            device_sn: device_sn.to_string(),
        });
    }
    Ok(out)
}

fn map_metadata_block(master: &str, labels: &[String]) -> IngestResult<Vec<ChannelDescriptor>> {
    if labels.len() < 2 {
        return Err(IngestError::malformed_header("no data columns"));
    }

    let mut parsed = Vec::with_capacity(labels.len() - 1);
    for (i, label) in labels[1..].iter().enumerate() {
        let column = i + 1;
        let (device_sn, rest) = match label.split_once(':') {
            Some((sn, rest)) if !sn.trim().is_empty() => (sn.trim(), rest),
            Some(_) => {
                return Err(IngestError::malformed_header(format!(
                    "empty device prefix in column {column} ('{label}')"
                )));
            }
            None => (master, label.as_str()),
        };
        let (name, unit) = split_label(column, rest)?;
        parsed.push((column, device_sn, name, unit));
    }
    let device_type = topology(parsed.iter().map(|(_, _, name, _)| name.as_str()));

    let mut master_channels = 0usize;
    let mut slave_counters: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::with_capacity(parsed.len());
    for (column, device_sn, name, unit) in parsed {
        let role = role_of(device_sn, master);
        let (channel_id, number) = match (role, phase_marker(&name)) {
            (DeviceRole::Master, Some(phase)) => (format!("M{master}_U{phase}"), phase as usize),
            (DeviceRole::Master, None) => {
                master_channels += 1;
                (format!("M{master}_Ch{master_channels}"), master_channels)
            }
            (DeviceRole::Slave, _) => {
                let n = slave_counters.entry(device_sn).or_insert(0);
                *n += 1;
                (format!("M{master}_S{device_sn}_Ch{n}"), *n)
            }
        };

        out.push(ChannelDescriptor {
            column,
            channel_id,
            unit,
            label: labels[column].clone(),
            name,
            number,
            device_type,
            device_role: role,
            master_sn: master.to_string(),
            device_sn: device_sn.to_string(),
        });
    }
    Ok(out)
}

fn role_of(device_sn: &str, master: &str) -> DeviceRole {
    if device_sn == master {
        DeviceRole::Master
    } else {
        DeviceRole::Slave
    }
}

/// Split a label into `(name, unit)` on its last whitespace.
fn split_label(column: usize, label: &str) -> IngestResult<(String, String)> {
    let label = label.trim();
    if label.is_empty() {
        return Err(IngestError::malformed_header(format!(
            "missing label for column {column}"
        )));
    }
    match label.rsplit_once(char::is_whitespace) {
        Some((name, unit)) if !name.trim().is_empty() && !unit.is_empty() => {
            Ok((name.trim().to_string(), unit.to_string()))
        }
        _ => Err(IngestError::malformed_header(format!(
            "label '{label}' in column {column} has no unit"
        ))),
    }
}

/// Phase number of a `Ph1` / `Ph 2` / `PH3` name.
pub(crate) fn phase_marker(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    let digits = lower.strip_prefix("ph")?.trim_start();
    match digits.parse::<u8>() {
        Ok(p @ 1..=3) => Some(p),
        _ => None,
    }
}

fn topology<'a>(names: impl Iterator<Item = &'a str>) -> DeviceType {
    let multi = names
        .filter_map(phase_marker)
        .any(|phase| phase > 1);
    if multi {
        DeviceType::ThreePhase
    } else {
        DeviceType::SinglePhase
    }
}

fn ensure_unique_ids(channels: &[ChannelDescriptor]) -> IngestResult<()> {
    let mut seen = HashSet::with_capacity(channels.len());
    for c in channels {
        if !seen.insert(c.channel_id.as_str()) {
            return Err(IngestError::malformed_header(format!(
                "ambiguous labels: channel id '{}' appears twice (column {})",
                c.channel_id, c.column
            )));
        }
    }
    Ok(())
}
