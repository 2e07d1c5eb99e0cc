//! File API access for cloudfm.
//!
//! This module provides the REST client and wire types for the file server:
//! - Listing files in a storage backend
//! - Multipart uploads
//! - Downloads and deletes by name

mod client;
mod types;

pub use client::FileApiClient;
pub use types::{ActionResponse, ErrorBody, FileRecord, StorageBackend};
