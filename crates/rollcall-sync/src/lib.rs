//! rollcall-sync — Best-effort mirror of attendance events into a remote
//! key-value hierarchy (Firebase-style REST database).
//!
//! Each event is written at two addresses, indexed by date and by identity:
//!
//! ```text
//! attendance/{date}/{identity}
//! attendance/students/{identity}/{date}
//! ```
//!
//! The two writes are independent: a failure on one never blocks the other,
//! both are always attempted, and there is no rollback and no automatic
//! retry. The local ledger is the source of truth; the remote hierarchy can
//! lag or diverge after failures, and reconciliation is out of scope.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime};
use rollcall_core::Identity;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Characters the remote database rejects in path segments.
const RESERVED_PATH_CHARS: [char; 5] = ['.', '$', '#', '[', ']'];

#[derive(Error, Debug)]
pub enum RemoteWriteError {
    #[error("invalid character {1:?} in remote path {0:?}")]
    InvalidPath(String, char),
    #[error("remote returned status {status} for {path}")]
    Status { path: String, status: u16 },
    #[error("network error writing {path}: {message}")]
    Network { path: String, message: String },
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

/// One attendance record as stored at both remote addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub time: String,
    pub status: String,
    pub last_updated: String,
}

impl AttendanceRecord {
    /// Build a "present" record stamped with the current wall-clock time.
    pub fn present(time: NaiveTime) -> Self {
        Self {
            time: time.format(TIME_FORMAT).to_string(),
            status: "present".to_string(),
            last_updated: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Writes one record at one remote path.
#[async_trait]
pub trait RecordTransport {
    async fn put(&self, path: &str, record: &AttendanceRecord) -> Result<(), RemoteWriteError>;
}

/// REST transport for a Firebase-style realtime database: each path is
/// PUT as JSON at `{base_url}/{path}.json`, with an optional auth token.
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestTransport {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
    ) -> Result<Self, RemoteWriteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RemoteWriteError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }
}

#[async_trait]
impl RecordTransport for RestTransport {
    async fn put(&self, path: &str, record: &AttendanceRecord) -> Result<(), RemoteWriteError> {
        if let Some(c) = path.chars().find(|c| RESERVED_PATH_CHARS.contains(c)) {
            return Err(RemoteWriteError::InvalidPath(path.to_string(), c));
        }

        let mut request = self
            .client
            .put(format!("{}/{}.json", self.base_url, path))
            .json(record);
        if let Some(token) = &self.auth_token {
            request = request.query(&[("auth", token)]);
        }

        let response = request.send().await.map_err(|e| RemoteWriteError::Network {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(RemoteWriteError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// Independent results of the two mirrored writes.
#[derive(Debug)]
pub struct PublishOutcome {
    pub by_date: Result<(), RemoteWriteError>,
    pub by_identity: Result<(), RemoteWriteError>,
}

impl PublishOutcome {
    pub fn fully_synced(&self) -> bool {
        self.by_date.is_ok() && self.by_identity.is_ok()
    }

    /// Failure messages for the error log, one per failed address.
    pub fn failures(&self) -> Vec<String> {
        [&self.by_date, &self.by_identity]
            .into_iter()
            .filter_map(|r| r.as_ref().err().map(|e| e.to_string()))
            .collect()
    }
}

pub struct RemoteSync<T: RecordTransport> {
    transport: T,
}

impl<T: RecordTransport> RemoteSync<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Mirror one attendance event to both addresses.
    ///
    /// Both writes are attempted even when the first fails; the outcome
    /// reports each independently and is never an error at this level.
    pub async fn publish(
        &self,
        identity: &Identity,
        date: NaiveDate,
        time: NaiveTime,
    ) -> PublishOutcome {
        let record = AttendanceRecord::present(time);
        let date_key = date.format(DATE_FORMAT).to_string();

        let by_date_path = format!("attendance/{date_key}/{identity}");
        let by_identity_path = format!("attendance/students/{identity}/{date_key}");

        let by_date = self.transport.put(&by_date_path, &record).await;
        if let Err(e) = &by_date {
            tracing::warn!(identity = %identity, error = %e, "date-indexed remote write failed");
        }

        let by_identity = self.transport.put(&by_identity_path, &record).await;
        if let Err(e) = &by_identity {
            tracing::warn!(identity = %identity, error = %e, "identity-indexed remote write failed");
        }

        PublishOutcome {
            by_date,
            by_identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory transport: records every successful put, fails any path in
    /// the fail set, and counts attempts either way.
    #[derive(Default)]
    struct MemoryTransport {
        written: Mutex<HashMap<String, AttendanceRecord>>,
        fail_paths: HashSet<String>,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RecordTransport for MemoryTransport {
        async fn put(
            &self,
            path: &str,
            record: &AttendanceRecord,
        ) -> Result<(), RemoteWriteError> {
            self.attempts.lock().unwrap().push(path.to_string());
            if self.fail_paths.contains(path) {
                return Err(RemoteWriteError::Status {
                    path: path.to_string(),
                    status: 503,
                });
            }
            self.written
                .lock()
                .unwrap()
                .insert(path.to_string(), record.clone());
            Ok(())
        }
    }

    fn identity(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn time() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_publish_writes_both_addresses() {
        let sync = RemoteSync::new(MemoryTransport::default());
        let outcome = sync.publish(&identity("S101"), date(), time()).await;

        assert!(outcome.fully_synced());
        let written = sync.transport.written.lock().unwrap();
        let a = written.get("attendance/2024-05-01/S101").unwrap();
        let b = written.get("attendance/students/S101/2024-05-01").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.time, "09:00:00");
        assert_eq!(a.status, "present");
        assert!(!a.last_updated.is_empty());
    }

    #[tokio::test]
    async fn test_failure_on_one_address_does_not_block_the_other() {
        let transport = MemoryTransport {
            fail_paths: HashSet::from(["attendance/2024-05-01/S101".to_string()]),
            ..Default::default()
        };
        let sync = RemoteSync::new(transport);
        let outcome = sync.publish(&identity("S101"), date(), time()).await;

        assert!(outcome.by_date.is_err());
        assert!(outcome.by_identity.is_ok());
        assert!(!outcome.fully_synced());
        assert_eq!(outcome.failures().len(), 1);

        // Both paths were attempted despite the first failing
        assert_eq!(sync.transport.attempts.lock().unwrap().len(), 2);
        assert!(sync
            .transport
            .written
            .lock()
            .unwrap()
            .contains_key("attendance/students/S101/2024-05-01"));
    }

    #[tokio::test]
    async fn test_both_failures_reported_independently() {
        let transport = MemoryTransport {
            fail_paths: HashSet::from([
                "attendance/2024-05-01/S101".to_string(),
                "attendance/students/S101/2024-05-01".to_string(),
            ]),
            ..Default::default()
        };
        let sync = RemoteSync::new(transport);
        let outcome = sync.publish(&identity("S101"), date(), time()).await;

        assert!(outcome.by_date.is_err());
        assert!(outcome.by_identity.is_err());
        assert_eq!(outcome.failures().len(), 2);
    }

    #[test]
    fn test_reserved_path_characters_rejected() {
        // Path validation is synchronous and independent of the network.
        let path = "attendance/2024-05-01/bad#key";
        let c = path.chars().find(|c| RESERVED_PATH_CHARS.contains(c));
        assert_eq!(c, Some('#'));
    }
}
