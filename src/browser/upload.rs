//! Sequential upload batches.
//!
//! A batch uploads its files strictly one after another. Only one batch may
//! be in flight at a time; [`UploadQueue::try_begin`] hands out the single
//! [`BusyGuard`] and the flag clears when the guard is dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::{ActionResponse, FileApiClient, StorageBackend};
use crate::error::{CloudFmError, Result};

/// What a failed upload does to the rest of its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abandon the remaining files; they are reported as skipped.
    #[default]
    Stop,
    /// Upload every file regardless of earlier failures.
    Continue,
}

/// One file submitted for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A local file, read when its turn comes.
    File(PathBuf),
    /// Content already in memory.
    Bytes {
        /// Name to store the file under.
        name: String,
        /// File content.
        content: Vec<u8>,
    },
}

impl UploadSource {
    /// Upload a local file under its final path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        UploadSource::File(path.into())
    }

    /// Upload in-memory content under `name`.
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        UploadSource::Bytes {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Name the file will be stored under.
    pub fn name(&self) -> String {
        match self {
            UploadSource::File(path) => file_name_of(path),
            UploadSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Read the content, enforcing the size limit before reading.
    async fn load(self, max_bytes: u64) -> Result<(String, Vec<u8>)> {
        match self {
            UploadSource::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        CloudFmError::Validation(format!("{} has no file name", path.display()))
                    })?;
                let metadata = tokio::fs::metadata(&path).await?;
                if !metadata.is_file() {
                    return Err(CloudFmError::Validation(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                check_size(&name, metadata.len(), max_bytes)?;
                let content = tokio::fs::read(&path).await?;
                Ok((name, content))
            }
            UploadSource::Bytes { name, content } => {
                check_size(&name, content.len() as u64, max_bytes)?;
                Ok((name, content))
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn check_size(name: &str, size: u64, max_bytes: u64) -> Result<()> {
    if size > max_bytes {
        let max_mb = max_bytes / 1024 / 1024;
        return Err(CloudFmError::Validation(format!(
            "{} is too large ({} bytes, max {}MB)",
            name, size, max_mb
        )));
    }
    Ok(())
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// A file's request is about to be sent.
    Started {
        /// Zero-based position in the batch.
        index: usize,
        /// Batch size.
        total: usize,
        /// File name.
        name: String,
    },
    /// The server accepted a file.
    Uploaded {
        /// File name.
        name: String,
        /// Server message, if any.
        message: Option<String>,
    },
    /// A file failed.
    Failed {
        /// File name.
        name: String,
        /// Short failure reason.
        reason: String,
    },
    /// A file was not attempted because an earlier one failed.
    Skipped {
        /// File name.
        name: String,
    },
    /// The batch is over and the busy flag is clear.
    Finished(UploadSummary),
}

/// Outcome of a batch, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Names uploaded successfully.
    pub uploaded: Vec<String>,
    /// Names that failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Names never attempted.
    pub skipped: Vec<String>,
}

impl UploadSummary {
    /// Number of files submitted.
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len() + self.skipped.len()
    }

    /// Whether every file was uploaded.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Busy flag shared between the browser and its running batch.
#[derive(Debug, Clone)]
pub struct UploadQueue {
    busy: Arc<AtomicBool>,
    policy: FailurePolicy,
    max_bytes: u64,
}

impl UploadQueue {
    /// Create an idle queue.
    pub fn new(policy: FailurePolicy, max_bytes: u64) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            policy,
            max_bytes,
        }
    }

    /// Whether a batch is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Failure policy applied to batches.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Per-file size limit in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Claim the busy flag, or `None` while another batch holds it.
    pub fn try_begin(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                flag: Arc::clone(&self.busy),
            })
    }
}

/// Holds the busy flag for the life of a batch.
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A batch ready to run.
#[derive(Debug)]
pub struct UploadBatch {
    /// Target backend.
    pub storage: StorageBackend,
    /// Files in submission order.
    pub sources: Vec<UploadSource>,
    /// Failure policy.
    pub policy: FailurePolicy,
    /// Per-file size limit in bytes.
    pub max_bytes: u64,
}

impl UploadBatch {
    /// Upload every file in order, reporting progress on `events`.
    ///
    /// `Finished` is sent before the guard is released, so whoever claims
    /// the flag next finds every event of this batch already queued.
    pub async fn run(
        self,
        client: FileApiClient,
        events: UnboundedSender<UploadEvent>,
        guard: BusyGuard,
    ) -> UploadSummary {
        let total = self.sources.len();
        let mut summary = UploadSummary::default();
        let mut stopped = false;

        tracing::info!(
            "upload batch of {} file(s) to {} storage",
            total,
            self.storage
        );

        for (index, source) in self.sources.into_iter().enumerate() {
            let name = source.name();

            if stopped {
                tracing::warn!("skipping {} after earlier failure", name);
                let _ = events.send(UploadEvent::Skipped { name: name.clone() });
                summary.skipped.push(name);
                continue;
            }

            let _ = events.send(UploadEvent::Started {
                index,
                total,
                name: name.clone(),
            });

            match upload_one(&client, self.storage, source, self.max_bytes).await {
                Ok(reply) => {
                    tracing::info!("uploaded {}", name);
                    let _ = events.send(UploadEvent::Uploaded {
                        name: name.clone(),
                        message: reply.message,
                    });
                    summary.uploaded.push(name);
                }
                Err(e) => {
                    tracing::error!("failed to upload {}: {}", name, e);
                    let reason = e.summary();
                    let _ = events.send(UploadEvent::Failed {
                        name: name.clone(),
                        reason: reason.clone(),
                    });
                    summary.failed.push((name, reason));
                    if self.policy == FailurePolicy::Stop {
                        stopped = true;
                    }
                }
            }
        }

        let _ = events.send(UploadEvent::Finished(summary.clone()));
        drop(guard);
        summary
    }
}

async fn upload_one(
    client: &FileApiClient,
    storage: StorageBackend,
    source: UploadSource,
    max_bytes: u64,
) -> Result<ActionResponse> {
    let (name, content) = source.load(max_bytes).await?;
    client.upload_file(storage, &name, content).await
}
