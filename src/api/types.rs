//! Wire types for the file API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::datetime::parse_timestamp;
use crate::CloudFmError;

/// Server-side file location mode, sent as `?storage=` on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageBackend {
    /// Files kept in the server's upload directory.
    #[default]
    Local,
    /// Files kept in server memory (lost on restart).
    Memory,
}

impl StorageBackend {
    /// All backends, in menu order.
    pub const ALL: [StorageBackend; 2] = [StorageBackend::Local, StorageBackend::Memory];

    /// Query-string value for the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Local => "local",
            StorageBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = CloudFmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(CloudFmError::Validation(format!(
                "unknown storage backend: {s} (expected local or memory)"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for StorageBackend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One file as listed by `GET /api/files`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    /// File name, unique per storage backend.
    #[serde(alias = "Name")]
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Last modification time, if the server knows it.
    #[serde(
        rename = "modified",
        alias = "modTime",
        default,
        deserialize_with = "deserialize_timestamp"
    )]
    pub modified: Option<DateTime<Utc>>,
    /// Server-side path (informational).
    #[serde(default)]
    pub path: Option<String>,
    /// Whether the entry is a directory.
    #[serde(rename = "isDir", default)]
    pub is_dir: bool,
}

impl FileRecord {
    /// Create a record with no path and no directory flag.
    pub fn new(name: impl Into<String>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
            path: None,
            is_dir: false,
        }
    }
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Reply body of upload and delete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionResponse {
    /// Whether the server performed the action.
    #[serde(default)]
    pub success: bool,
    /// Human readable message.
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
    /// Name the server stored the file under.
    #[serde(default, rename = "fileName", alias = "filename")]
    pub file_name: Option<String>,
}

/// JSON envelope sent with non-2xx replies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// Short error string.
    #[serde(default)]
    pub error: Option<String>,
    /// HTTP status echoed by the server.
    #[serde(default)]
    pub code: Option<u16>,
    /// Detailed message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Best message available in the envelope.
    pub fn best_message(&self) -> Option<&str> {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
    }
}
