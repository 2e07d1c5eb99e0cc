//! HTTP client for the file API.
//!
//! Every operation is one request/response round trip. Non-2xx replies,
//! undecodable bodies and `success: false` answers all come back as
//! [`CloudFmError`] values; nothing is retried.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use url::Url;

use crate::api::types::{ActionResponse, ErrorBody, FileRecord, StorageBackend};
use crate::config::ServerConfig;
use crate::error::{CloudFmError, Result};

/// User agent string sent with every request.
const USER_AGENT: &str = concat!("cloudfm/", env!("CARGO_PKG_VERSION"));

/// Longest plain-text error body echoed into an error message.
const MAX_PLAIN_ERROR_LEN: usize = 200;

/// Client for the `/api/files` and `/api/upload` routes.
#[derive(Debug, Clone)]
pub struct FileApiClient {
    client: Client,
    base_url: Url,
}

impl FileApiClient {
    /// Create a client for the configured server.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CloudFmError::Config(format!("invalid base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CloudFmError::Config(format!(
                "base_url cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CloudFmError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Base URL the API routes are appended to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/{segments...}?storage={backend}`.
    ///
    /// Segments are percent-encoded individually, so a file name containing
    /// `/`, `?` or spaces stays a single path segment.
    fn endpoint(&self, segments: &[&str], storage: StorageBackend) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                CloudFmError::Config(format!("base_url cannot carry a path: {}", self.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("storage", storage.as_str());
        Ok(url)
    }

    /// GET /api/files - List all files in a storage backend.
    pub async fn list_files(&self, storage: StorageBackend) -> Result<Vec<FileRecord>> {
        let url = self.endpoint(&["api", "files"], storage)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CloudFmError::Http(format!("failed to list files: {}", e)))?;
        let response = ensure_success(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CloudFmError::Http(format!("failed to read response: {}", e)))?;

        // An empty store is sometimes encoded as `null` rather than `[]`.
        let files: Option<Vec<FileRecord>> = serde_json::from_slice(&bytes)
            .map_err(|e| CloudFmError::Decode(format!("file list: {}", e)))?;
        let files = files.unwrap_or_default();

        tracing::debug!("listed {} files from {} storage", files.len(), storage);
        Ok(files)
    }

    /// POST /api/upload - Upload one file as multipart field `file`.
    pub async fn upload_file(
        &self,
        storage: StorageBackend,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<ActionResponse> {
        validate_name(file_name)?;
        let url = self.endpoint(&["api", "upload"], storage)?;
        tracing::debug!("POST {} ({}, {} bytes)", url, file_name, content.len());

        let content_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string();
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(&content_type)
            .map_err(|e| CloudFmError::Validation(format!("MIME error: {}", e)))?;
        // The backend also travels as a form field for servers that read
        // it from the body instead of the query string.
        let form = Form::new()
            .part("file", part)
            .text("storage", storage.as_str());

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CloudFmError::Http(format!("upload request failed: {}", e)))?;
        let response = ensure_success(response).await?;

        read_action(response, "upload").await
    }

    /// GET /api/files/{name} - Download a file's content.
    pub async fn download_file(&self, storage: StorageBackend, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        let url = self.endpoint(&["api", "files", name], storage)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CloudFmError::Http(format!("download request failed: {}", e)))?;
        let response = ensure_success(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CloudFmError::Http(format!("failed to read download: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// DELETE /api/files/{name} - Delete a file.
    pub async fn delete_file(&self, storage: StorageBackend, name: &str) -> Result<ActionResponse> {
        validate_name(name)?;
        let url = self.endpoint(&["api", "files", name], storage)?;
        tracing::debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| CloudFmError::Http(format!("delete request failed: {}", e)))?;
        let response = ensure_success(response).await?;

        read_action(response, "delete").await
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CloudFmError::Validation("file name is required".to_string()));
    }
    Ok(())
}

/// Turn a non-2xx reply into [`CloudFmError::Status`].
///
/// The message comes from the JSON error envelope when there is one, then
/// from a short plain-text body, then from the status reason phrase.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|envelope| envelope.best_message().map(str::to_string))
        .or_else(|| {
            let text = body.trim();
            (!text.is_empty() && text.len() <= MAX_PLAIN_ERROR_LEN && !text.starts_with('{'))
                .then(|| text.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    tracing::warn!("server returned {}: {}", status, message);
    Err(CloudFmError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Decode an upload/delete reply and reject `success: false`.
async fn read_action(response: Response, action: &str) -> Result<ActionResponse> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| CloudFmError::Http(format!("failed to read response: {}", e)))?;
    let reply: ActionResponse = serde_json::from_slice(&bytes)
        .map_err(|e| CloudFmError::Decode(format!("{} reply: {}", action, e)))?;

    if !reply.success {
        let message = reply
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("{} was not accepted", action));
        return Err(CloudFmError::Rejected(message));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: &str) -> FileApiClient {
        let config = ServerConfig {
            base_url: base.to_string(),
            ..Default::default()
        };
        FileApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_list() {
        let client = client_for("http://localhost:8080");
        let url = client
            .endpoint(&["api", "files"], StorageBackend::Local)
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/files?storage=local");
    }

    #[test]
    fn test_endpoint_with_prefix_and_trailing_slash() {
        let client = client_for("http://files.example.com/fm/");
        let url = client
            .endpoint(&["api", "upload"], StorageBackend::Memory)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://files.example.com/fm/api/upload?storage=memory"
        );
    }

    #[test]
    fn test_endpoint_encodes_name_as_one_segment() {
        let client = client_for("http://localhost:8080");
        let url = client
            .endpoint(&["api", "files", "my report?/v2.txt"], StorageBackend::Local)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/files/my%20report%3F%2Fv2.txt?storage=local"
        );
    }

    #[test]
    fn test_endpoint_drops_base_query() {
        let client = client_for("http://localhost:8080/?storage=memory");
        let url = client
            .endpoint(&["api", "files"], StorageBackend::Local)
            .unwrap();
        assert_eq!(url.query(), Some("storage=local"));
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let config = ServerConfig {
            base_url: "::not a url::".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            FileApiClient::new(&config),
            Err(CloudFmError::Config(_))
        ));

        let config = ServerConfig {
            base_url: "mailto:ops@example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            FileApiClient::new(&config),
            Err(CloudFmError::Config(_))
        ));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.txt").is_ok());
        assert!(matches!(validate_name(""), Err(CloudFmError::Validation(_))));
        assert!(matches!(validate_name("   "), Err(CloudFmError::Validation(_))));
    }
}
