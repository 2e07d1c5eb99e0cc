//! File browser session controller.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::notification::{Notification, NotificationCenter, NotificationKind};
use super::search::filter_records;
use super::upload::{UploadBatch, UploadEvent, UploadQueue, UploadSource, UploadSummary};
use crate::api::{FileApiClient, FileRecord, StorageBackend};
use crate::config::Config;
use crate::error::{CloudFmError, Result};

/// State of the file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// A list request is in flight.
    Loading,
    /// Records are shown.
    Ready,
    /// Nothing to show (no files, or nothing matches the search).
    Empty,
    /// The last list request failed; the previous records are kept.
    Error(String),
}

/// Read-only snapshot handed to the renderer.
#[derive(Debug, Clone)]
pub struct BrowserView<'a> {
    /// Selected backend.
    pub storage: StorageBackend,
    /// List state.
    pub state: &'a ViewState,
    /// Records after the search filter.
    pub records: Vec<&'a FileRecord>,
    /// Number of records in the last successful fetch.
    pub total: usize,
    /// Current search query.
    pub query: &'a str,
    /// Upload progress line.
    pub progress: Option<&'a str>,
    /// Visible notification.
    pub notification: Option<&'a Notification>,
}

/// Controller owning one browsing session against the file API.
///
/// Every failure is logged and surfaced as an error notification; the
/// session itself stays usable.
pub struct FileBrowser {
    client: FileApiClient,
    storage: StorageBackend,
    records: Vec<FileRecord>,
    query: String,
    state: ViewState,
    notifications: NotificationCenter,
    uploads: UploadQueue,
    progress: Option<String>,
    reload_pending: bool,
    events_tx: UnboundedSender<UploadEvent>,
    events_rx: UnboundedReceiver<UploadEvent>,
}

impl FileBrowser {
    /// Create a browser using `client`, with settings from `config`.
    ///
    /// Nothing is fetched until [`FileBrowser::refresh`] is called.
    pub fn new(client: FileApiClient, config: &Config) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            storage: config.server.storage,
            records: Vec::new(),
            query: String::new(),
            state: ViewState::Loading,
            notifications: NotificationCenter::new(Duration::from_secs(
                config.display.notification_secs,
            )),
            uploads: UploadQueue::new(
                config.upload.on_failure,
                config.upload.max_upload_bytes(),
            ),
            progress: None,
            reload_pending: false,
            events_tx,
            events_rx,
        }
    }

    /// Build the API client from `config` and create a browser.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = FileApiClient::new(&config.server)?;
        Ok(Self::new(client, config))
    }

    /// Selected backend.
    pub fn storage(&self) -> StorageBackend {
        self.storage
    }

    /// Records from the last successful fetch.
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Records matching the current search query.
    pub fn visible_records(&self) -> Vec<&FileRecord> {
        filter_records(&self.records, &self.query)
    }

    /// Current search query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// List state.
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Upload progress line, while a batch runs.
    pub fn upload_progress(&self) -> Option<&str> {
        self.progress.as_deref()
    }

    /// Whether an upload batch is in flight.
    pub fn is_uploading(&self) -> bool {
        self.uploads.is_busy()
    }

    /// Notification visible now.
    pub fn notification(&self) -> Option<&Notification> {
        self.notifications.current(Instant::now())
    }

    /// Most recent notification, even if it has expired.
    pub fn last_notification(&self) -> Option<&Notification> {
        self.notifications.last()
    }

    /// Hide the current notification.
    pub fn dismiss_notification(&mut self) {
        self.notifications.dismiss();
    }

    /// Snapshot for rendering as of `now`.
    pub fn view_at(&self, now: Instant) -> BrowserView<'_> {
        BrowserView {
            storage: self.storage,
            state: &self.state,
            records: self.visible_records(),
            total: self.records.len(),
            query: &self.query,
            progress: self.progress.as_deref(),
            notification: self.notifications.current(now),
        }
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> BrowserView<'_> {
        self.view_at(Instant::now())
    }

    /// Fetch the file list for the selected backend.
    ///
    /// On failure the previous records stay in place and the state becomes
    /// [`ViewState::Error`].
    pub async fn refresh(&mut self) -> Result<()> {
        self.state = ViewState::Loading;

        match self.client.list_files(self.storage).await {
            Ok(records) => {
                tracing::info!(
                    "loaded {} files from {} storage",
                    records.len(),
                    self.storage
                );
                self.records = records;
                self.state = self.settled_state();
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load files: {}", e);
                self.state = ViewState::Error(e.summary());
                self.notifications
                    .show("Failed to load files", NotificationKind::Error);
                Err(e)
            }
        }
    }

    /// Switch backend and reload.
    ///
    /// Records of the previous backend are dropped first so they are never
    /// shown under the new backend's name.
    pub async fn set_storage(&mut self, storage: StorageBackend) -> Result<()> {
        if storage != self.storage {
            tracing::info!("switching storage {} -> {}", self.storage, storage);
            self.storage = storage;
            self.records.clear();
        }
        self.refresh().await
    }

    /// Set the search query.
    pub fn search(&mut self, query: impl Into<String>) {
        self.query = query.into();
        if matches!(self.state, ViewState::Ready | ViewState::Empty) {
            self.state = self.settled_state();
        }
    }

    /// Clear the search query.
    pub fn clear_search(&mut self) {
        self.search(String::new());
    }

    fn settled_state(&self) -> ViewState {
        if self.visible_records().is_empty() {
            ViewState::Empty
        } else {
            ViewState::Ready
        }
    }

    /// Start an upload batch in the background.
    ///
    /// Progress is applied by [`FileBrowser::poll_uploads`]. Fails with
    /// [`CloudFmError::Busy`] while another batch is in flight.
    pub fn start_upload(&mut self, sources: Vec<UploadSource>) -> Result<JoinHandle<UploadSummary>> {
        if sources.is_empty() {
            let e = CloudFmError::Validation("no files selected".to_string());
            return Err(self.fail("Failed to upload", e));
        }

        let guard = match self.uploads.try_begin() {
            Some(guard) => guard,
            None => {
                tracing::warn!("upload rejected: batch already in flight");
                self.notifications
                    .show("Upload already in progress", NotificationKind::Error);
                return Err(CloudFmError::Busy);
            }
        };

        // Events of the previous batch are all queued once its guard is
        // gone; apply them now so they cannot overwrite this batch's state.
        self.apply_upload_events();
        self.progress = Some(format!("Uploading {}...", sources[0].name()));

        let batch = UploadBatch {
            storage: self.storage,
            sources,
            policy: self.uploads.policy(),
            max_bytes: self.uploads.max_bytes(),
        };
        let client = self.client.clone();
        let events = self.events_tx.clone();
        Ok(tokio::spawn(batch.run(client, events, guard)))
    }

    /// Upload files in order and wait for the batch to finish.
    pub async fn upload(&mut self, sources: Vec<UploadSource>) -> Result<UploadSummary> {
        let handle = self.start_upload(sources)?;
        let summary = handle
            .await
            .map_err(|e| CloudFmError::Task(format!("upload batch: {}", e)))?;
        self.poll_uploads().await;
        Ok(summary)
    }

    /// Apply upload progress received since the last poll.
    ///
    /// Reloads the list once if any file was uploaded. Returns the number of
    /// events applied.
    pub async fn poll_uploads(&mut self) -> usize {
        let applied = self.apply_upload_events();

        if std::mem::take(&mut self.reload_pending) {
            // A failed reload notifies on its own.
            let _ = self.refresh().await;
        }
        applied
    }

    /// Apply queued upload events without touching the network.
    ///
    /// A successful upload marks the list for reloading on the next poll.
    fn apply_upload_events(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(event) = self.events_rx.try_recv() {
            applied += 1;
            match event {
                UploadEvent::Started { index, total, name } => {
                    self.progress = Some(if total > 1 {
                        format!("Uploading {} ({}/{})...", name, index + 1, total)
                    } else {
                        format!("Uploading {}...", name)
                    });
                }
                UploadEvent::Uploaded { name, .. } => {
                    self.notifications
                        .show(format!("Uploaded {}", name), NotificationKind::Success);
                    self.reload_pending = true;
                }
                UploadEvent::Failed { name, reason } => {
                    self.notifications.show(
                        format!("Failed to upload {}: {}", name, reason),
                        NotificationKind::Error,
                    );
                }
                UploadEvent::Skipped { name } => {
                    tracing::warn!("upload of {} skipped", name);
                }
                UploadEvent::Finished(summary) => {
                    self.progress = None;
                    self.notify_batch(&summary);
                }
            }
        }
        applied
    }

    fn notify_batch(&mut self, summary: &UploadSummary) {
        let total = summary.total();
        if total <= 1 {
            return;
        }
        if summary.all_succeeded() {
            self.notifications
                .show(format!("Uploaded {} files", total), NotificationKind::Success);
        } else {
            let failed: Vec<&str> = summary.failed.iter().map(|(n, _)| n.as_str()).collect();
            let mut message = format!(
                "Uploaded {} of {} files; failed: {}",
                summary.uploaded.len(),
                total,
                failed.join(", ")
            );
            if !summary.skipped.is_empty() {
                message.push_str(&format!("; skipped {}", summary.skipped.len()));
            }
            self.notifications.show(message, NotificationKind::Error);
        }
    }

    /// Download a file into `dest_dir`, returning the written path.
    pub async fn download(&mut self, name: &str, dest_dir: &Path) -> Result<PathBuf> {
        match self.try_download(name, dest_dir).await {
            Ok(path) => {
                tracing::info!("downloaded {} to {}", name, path.display());
                self.notifications
                    .show(format!("Downloaded {}", name), NotificationKind::Success);
                Ok(path)
            }
            Err(e) => Err(self.fail(&format!("Failed to download {}", name), e)),
        }
    }

    async fn try_download(&self, name: &str, dest_dir: &Path) -> Result<PathBuf> {
        let file_name = local_file_name(name)?;
        let content = self.client.download_file(self.storage, name).await?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(file_name);
        tokio::fs::write(&path, &content).await?;
        Ok(path)
    }

    /// Delete a file and reload the list.
    ///
    /// Asking for confirmation is up to the caller.
    pub async fn delete(&mut self, name: &str) -> Result<()> {
        match self.client.delete_file(self.storage, name).await {
            Ok(_) => {
                tracing::info!("deleted {} from {} storage", name, self.storage);
                self.notifications
                    .show(format!("Deleted {}", name), NotificationKind::Success);
                let _ = self.refresh().await;
                Ok(())
            }
            Err(e) => Err(self.fail(&format!("Failed to delete {}", name), e)),
        }
    }

    fn fail(&mut self, context: &str, e: CloudFmError) -> CloudFmError {
        tracing::error!("{}: {}", context, e);
        self.notifications
            .show(format!("{}: {}", context, e.summary()), NotificationKind::Error);
        e
    }
}

/// Local file name for a server-side name.
///
/// Only the final component is kept, so a hostile name cannot write
/// outside the download directory.
fn local_file_name(name: &str) -> Result<&str> {
    name.rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
        .ok_or_else(|| {
            CloudFmError::Validation(format!("cannot save {:?}: no usable file name", name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn browser() -> FileBrowser {
        let config = Config::default();
        FileBrowser::from_config(&config).unwrap()
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("a.txt").unwrap(), "a.txt");
        assert_eq!(local_file_name("dir/b.txt").unwrap(), "b.txt");
        assert_eq!(local_file_name("..\\..\\c.txt").unwrap(), "c.txt");
        assert!(local_file_name("..").is_err());
        assert!(local_file_name("dir/").is_err());
        assert!(local_file_name("").is_err());
    }

    #[test]
    fn test_initial_state() {
        let browser = browser();
        assert_eq!(browser.storage(), StorageBackend::Local);
        assert_eq!(browser.state(), &ViewState::Loading);
        assert!(browser.records().is_empty());
        assert!(browser.notification().is_none());
        assert!(!browser.is_uploading());
    }

    #[test]
    fn test_search_recomputes_settled_state() {
        let mut browser = browser();
        browser.records = vec![
            FileRecord::new("alpha.txt", 1, None),
            FileRecord::new("beta.txt", 2, None),
        ];
        browser.state = ViewState::Ready;

        browser.search("ALP");
        assert_eq!(browser.state(), &ViewState::Ready);
        assert_eq!(browser.visible_records().len(), 1);

        browser.search("gamma");
        assert_eq!(browser.state(), &ViewState::Empty);
        assert!(browser.visible_records().is_empty());

        browser.clear_search();
        assert_eq!(browser.state(), &ViewState::Ready);
        assert_eq!(browser.visible_records().len(), 2);
    }

    #[test]
    fn test_search_keeps_error_state() {
        let mut browser = browser();
        browser.state = ViewState::Error("down".to_string());
        browser.search("x");
        assert_eq!(browser.state(), &ViewState::Error("down".to_string()));
    }

    #[tokio::test]
    async fn test_start_upload_rejects_empty_batch() {
        let mut browser = browser();
        assert!(matches!(
            browser.start_upload(Vec::new()),
            Err(CloudFmError::Validation(_))
        ));
        assert!(!browser.is_uploading());
        assert_eq!(
            browser.notification().unwrap().message,
            "Failed to upload: validation error: no files selected"
        );
    }

    #[test]
    fn test_batch_notification() {
        let mut browser = browser();
        browser.notify_batch(&UploadSummary {
            uploaded: vec!["a".into(), "b".into()],
            ..Default::default()
        });
        assert_eq!(browser.notification().unwrap().message, "Uploaded 2 files");

        browser.notify_batch(&UploadSummary {
            uploaded: vec!["a".into()],
            failed: vec![("b".into(), "boom".into())],
            skipped: vec!["c".into()],
        });
        let note = browser.notification().unwrap();
        assert_eq!(note.kind, NotificationKind::Error);
        assert_eq!(note.message, "Uploaded 1 of 3 files; failed: b; skipped 1");
    }
}
