//! File browser session for cloudfm.
//!
//! This module holds the client-side state of one browsing session:
//! - The records of the last successful list request
//! - Case-insensitive search over file names
//! - Sequential upload batches guarded by a busy flag
//! - Auto-hiding notifications

mod controller;
mod notification;
mod search;
mod upload;

pub use controller::{BrowserView, FileBrowser, ViewState};
pub use notification::{Notification, NotificationCenter, NotificationKind};
pub use search::filter_records;
pub use upload::{
    BusyGuard, FailurePolicy, UploadBatch, UploadEvent, UploadQueue, UploadSource, UploadSummary,
};
