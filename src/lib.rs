//! cloudfm - Cloud File Manager client
//!
//! A terminal client for a REST file-storage service: list, upload,
//! download, delete and search files in a `local` or `memory` backend.

pub mod api;
pub mod browser;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod shell;
pub mod view;

pub use api::{ActionResponse, FileApiClient, FileRecord, StorageBackend};
pub use browser::{
    filter_records, FailurePolicy, FileBrowser, Notification, NotificationKind, UploadSource,
    UploadSummary, ViewState,
};
pub use config::Config;
pub use error::{CloudFmError, Result};
pub use shell::{Shell, ShellCommand};
pub use view::{file_count_label, format_size, render};
