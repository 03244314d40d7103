//! InfluxDB v2 HTTP sink.
//!
//! Buckets are looked up by name and created on first use; writes post line protocol with
//! second precision, split into batches of [`InfluxSettings::batch_size`] points. There is no
//! retry: a failed request fails the file being processed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SinkError;
use crate::types::Point;

use super::TimeSeriesSink;
use super::line_protocol::encode_points;

/// Default number of points per write request.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Connection settings for [`InfluxSink`].
#[derive(Clone, PartialEq, Eq)]
pub struct InfluxSettings {
    /// Base URL, e.g. `http://localhost:8086`.
    pub url: String,
    /// API token, sent as `Authorization: Token <token>`.
    pub token: String,
    /// Organisation name.
    pub org: String,
    pub batch_size: usize,
}

impl InfluxSettings {
    pub fn new(url: impl Into<String>, token: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            org: org.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("url", &self.url)
            .field("token_set", &!self.token.is_empty())
            .field("org", &self.org)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct OrgList {
    #[serde(default)]
    orgs: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    id: String,
    name: String,
}

/// Blocking InfluxDB v2 client implementing [`TimeSeriesSink`].
pub struct InfluxSink {
    settings: InfluxSettings,
    agent: ureq::Agent,
    known_buckets: Mutex<HashSet<String>>,
}

impl fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxSink")
            .field("settings", &self.settings)
            .finish()
    }
}

impl InfluxSink {
    pub fn new(settings: InfluxSettings) -> Self {
        Self {
            settings,
            agent: ureq::AgentBuilder::new().build(),
            known_buckets: Mutex::new(HashSet::new()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{path}", self.settings.url.trim_end_matches('/'))
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.settings.token)
    }

    fn bucket_exists(&self, name: &str) -> Result<bool, SinkError> {
        let list: BucketList = self
            .agent
            .get(&self.endpoint("buckets"))
            .set("Authorization", &self.authorization())
            .query("org", &self.settings.org)
            .query("name", name)
            .call()
            .map_err(from_ureq)?
            .into_json()
            .map_err(|e| SinkError::Protocol(format!("bucket list: {e}")))?;
        Ok(list.buckets.iter().any(|b| b.name == name))
    }

    fn org_id(&self) -> Result<String, SinkError> {
        let list: OrgList = self
            .agent
            .get(&self.endpoint("orgs"))
            .set("Authorization", &self.authorization())
            .query("org", &self.settings.org)
            .call()
            .map_err(from_ureq)?
            .into_json()
            .map_err(|e| SinkError::Protocol(format!("org list: {e}")))?;
        list.orgs
            .into_iter()
            .find(|o| o.name == self.settings.org)
            .map(|o| o.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SinkError::Protocol(format!("organisation '{}' not found", self.settings.org)))
    }

    fn create_bucket(&self, name: &str) -> Result<(), SinkError> {
        let org_id = self.org_id()?;
        self.agent
            .post(&self.endpoint("buckets"))
            .set("Authorization", &self.authorization())
            .send_json(serde_json::json!({ "name": name, "orgID": org_id }))
            .map_err(from_ureq)?;
        Ok(())
    }
}

impl TimeSeriesSink for InfluxSink {
    fn ensure_collection(&self, name: &str) -> Result<(), SinkError> {
        let mut known = self
            .known_buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if known.contains(name) {
            return Ok(());
        }

        if self.bucket_exists(name)? {
            debug!(bucket = name, "bucket exists");
        } else {
            info!(bucket = name, org = %self.settings.org, "creating bucket");
            self.create_bucket(name)?;
        }
        known.insert(name.to_string());
        Ok(())
    }

    fn write(&self, collection: &str, points: &[Point]) -> Result<(), SinkError> {
        for batch in points.chunks(self.settings.batch_size.max(1)) {
            let body = encode_points(batch);
            if body.is_empty() {
                continue;
            }
            self.agent
                .post(&self.endpoint("write"))
                .set("Authorization", &self.authorization())
                .set("Content-Type", "text/plain; charset=utf-8")
                .query("org", &self.settings.org)
                .query("bucket", collection)
                .query("precision", "s")
                .send_string(&body)
                .map_err(from_ureq)?;
            debug!(bucket = collection, points = batch.len(), "batch written");
        }
        Ok(())
    }
}

fn from_ureq(err: ureq::Error) -> SinkError {
    match err {
        ureq::Error::Status(status, response) => SinkError::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => SinkError::Transport(t.to_string()),
    }
}
