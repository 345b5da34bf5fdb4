//! Thin typed client for the Drive v3 calls the proxy needs.
//!
//! Every method takes a resolved [`Account`]; bearer tokens come from the
//! broker and are never stored here. Metadata calls carry a bounded
//! timeout; download and relay calls stream and are only bounded by the
//! connect timeout of the shared HTTP client.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header;
use serde::Deserialize;

use drivegate_accounts::{Account, TokenBroker};
use drivegate_common::{Error, Result};

use crate::types::{DriveCollection, DriveFile, UploadPoll};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fixed page size for listings and searches.
const PAGE_SIZE: &str = "100";

/// Ordering applied when the caller does not specify one.
const DEFAULT_ORDER: &str = "folder,name,modifiedTime desc";

/// Metadata fields requested for listings.
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,modifiedTime)";

/// Metadata fields requested for search results (parents included so the
/// access guard can check them).
const SEARCH_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,modifiedTime,parents)";

/// Metadata fields requested for a single node.
const NODE_FIELDS: &str = "id,name,kind,mimeType,size,modifiedTime,parents,md5Checksum";

/// Timeout for metadata (non-streaming) calls.
const API_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Cursor-map key for an unscoped (all-drives) search.
const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListResponse {
    next_page_token: Option<String>,
    files: Option<Vec<DriveFile>>,
    drives: Option<Vec<DriveCollection>>,
}

/// One upstream page of a listing, with the raw cursor still unsealed.
#[derive(Debug, Default)]
pub struct ListPage {
    pub next_cursor: Option<String>,
    pub files: Option<Vec<DriveFile>>,
    pub drives: Option<Vec<DriveCollection>>,
}

/// Merged result of a search fan-out: files from every scope plus the
/// updated per-scope cursor map (exhausted scopes removed).
#[derive(Debug, Default)]
pub struct SearchPage {
    pub files: Vec<DriveFile>,
    pub cursors: HashMap<String, String>,
}

/// Build the full-text query string: per-term escaped `fullText contains`
/// clauses joined with `and`, plus the fixed trash filter.
fn search_query(query: &str) -> String {
    let mut clauses: Vec<String> = query
        .split_whitespace()
        .filter(|term| !term.is_empty())
        .map(|term| {
            let escaped = term.replace('\\', "\\\\").replace('\'', "\\'");
            format!("fullText contains '{}'", escaped)
        })
        .collect();
    clauses.push("trashed = false".to_string());
    clauses.join(" and ")
}

/// Bytes received so far, from a `Range: bytes=0-<end>` header.
fn uploaded_bytes(range: &str) -> u64 {
    range
        .strip_prefix("bytes=0-")
        .and_then(|end| end.parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

/// Map a non-200 poll status to its tri-state result.
fn poll_from_status(status: u16, range: Option<&str>) -> Result<UploadPoll> {
    match status {
        404 => Ok(UploadPoll::Expired),
        308 => Ok(UploadPoll::Uploading {
            uploaded: range.map(uploaded_bytes).unwrap_or(0),
        }),
        other => Err(Error::UnexpectedStatus(other)),
    }
}

/// Google Drive API client.
pub struct DriveClient {
    http: reqwest::Client,
    broker: Arc<TokenBroker>,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, broker: Arc<TokenBroker>) -> Self {
        Self { http, broker }
    }

    async fn bearer(&self, account: &Account) -> Result<String> {
        let token = self.broker.access_token(account).await?;
        Ok(format!("Bearer {}", token))
    }

    /// List children of `parent`, or top-level drives when absent.
    pub async fn list_children(
        &self,
        account: &Account,
        parent: Option<&str>,
        order_by: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<ListPage> {
        let auth = self.bearer(account).await?;

        let mut request = match parent {
            Some(parent) => {
                let q = format!("'{}' in parents and trashed = false", parent);
                self.http
                    .get(format!("{}/files", DRIVE_API_BASE))
                    .query(&[
                        ("includeItemsFromAllDrives", "true"),
                        ("supportsAllDrives", "true"),
                        ("q", q.as_str()),
                        ("fields", LIST_FIELDS),
                        ("pageSize", PAGE_SIZE),
                        ("orderBy", order_by.unwrap_or(DEFAULT_ORDER)),
                    ])
            }
            None => self
                .http
                .get(format!("{}/drives", DRIVE_API_BASE))
                .query(&[("pageSize", PAGE_SIZE)]),
        };
        if let Some(cursor) = cursor {
            request = request.query(&[("pageToken", cursor)]);
        }

        let response: ListResponse = self.json_call(request, auth).await?;
        Ok(ListPage {
            next_cursor: response.next_page_token,
            files: response.files,
            drives: response.drives,
        })
    }

    /// Fetch node metadata, concurrently probing whether the id is itself a
    /// top-level drive; drive name/kind win when the probe succeeds.
    pub async fn get_node(&self, account: &Account, id: &str) -> Result<DriveFile> {
        let auth = self.bearer(account).await?;

        let file_call = self.json_call::<DriveFile>(
            self.http
                .get(format!("{}/files/{}", DRIVE_API_BASE, id))
                .query(&[("supportsAllDrives", "true"), ("fields", NODE_FIELDS)]),
            auth.clone(),
        );
        let probe_call = self.drive_probe(id, auth.clone());

        let (file, probe) = tokio::join!(file_call, probe_call);
        let mut file = file?;

        if let Some(drive) = probe {
            file.name = drive.name;
            file.kind = drive.kind;
        }

        Ok(file)
    }

    /// Probe `drives/{id}`; any failure means "not a drive".
    async fn drive_probe(&self, id: &str, auth: String) -> Option<DriveCollection> {
        let request = self
            .http
            .get(format!("{}/drives/{}", DRIVE_API_BASE, id))
            .query(&[("fields", "id,name,kind")]);
        self.json_call::<DriveCollection>(request, auth).await.ok()
    }

    /// Stream raw content, forwarding a client `Range` header verbatim.
    ///
    /// The response is returned whatever its status; the proxy forwards
    /// upstream status codes (200/206/404) to the caller unchanged.
    pub async fn download(
        &self,
        account: &Account,
        id: &str,
        range: Option<&str>,
    ) -> Result<reqwest::Response> {
        let auth = self.bearer(account).await?;

        let mut request = self
            .http
            .get(format!("{}/files/{}", DRIVE_API_BASE, id))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .header(header::AUTHORIZATION, auth);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("download failed: {}", e)))
    }

    /// Full-text search fanned out across the scoped drives (one call per
    /// drive, issued concurrently), or a single all-drives call when
    /// unscoped. Each scope advances its own cursor; exhausted scopes drop
    /// out of the returned map.
    pub async fn search(
        &self,
        account: &Account,
        query: &str,
        drive_scope: &[String],
        cursors: HashMap<String, String>,
    ) -> Result<SearchPage> {
        let auth = self.bearer(account).await?;
        let q = search_query(query);

        let scopes: Vec<Option<&str>> = if drive_scope.is_empty() {
            vec![None]
        } else {
            drive_scope.iter().map(|d| Some(d.as_str())).collect()
        };

        tracing::debug!(scopes = scopes.len(), "search fan-out");
        let calls = scopes.into_iter().map(|scope| {
            let key = scope.unwrap_or(GLOBAL_SCOPE).to_string();
            let cursor = cursors.get(&key).cloned();
            let auth = auth.clone();
            let q = q.clone();
            async move {
                let mut request = self
                    .http
                    .get(format!("{}/files", DRIVE_API_BASE))
                    .query(&[
                        ("includeItemsFromAllDrives", "true"),
                        ("supportsAllDrives", "true"),
                        ("fields", SEARCH_FIELDS),
                        ("pageSize", PAGE_SIZE),
                        ("q", q.as_str()),
                    ]);
                request = match scope {
                    Some(drive) => request.query(&[("corpora", "drive"), ("driveId", drive)]),
                    None => request.query(&[("corpora", "allDrives")]),
                };
                if let Some(cursor) = cursor {
                    request = request.query(&[("pageToken", cursor.as_str())]);
                }

                let response: ListResponse = self.json_call(request, auth).await?;
                Ok::<_, Error>((key, response))
            }
        });

        let responses = futures::future::try_join_all(calls).await?;

        let mut page = SearchPage::default();
        for (key, response) in responses {
            if let Some(cursor) = response.next_page_token {
                page.cursors.insert(key, cursor);
            }
            if let Some(files) = response.files {
                page.files.extend(files);
            }
        }
        Ok(page)
    }

    /// Open a resumable upload session sized to the source node, returning
    /// the upstream-issued handle (the `upload_id`).
    pub async fn initiate_upload(
        &self,
        account: &Account,
        source: &DriveFile,
        destination_parent: &str,
    ) -> Result<String> {
        let auth = self.bearer(account).await?;

        let response = self
            .http
            .post(format!("{}/files", DRIVE_UPLOAD_BASE))
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json; charset=UTF-8")
            .header(
                "X-Upload-Content-Type",
                source.mime_type.as_deref().unwrap_or("application/octet-stream"),
            )
            .header(
                "X-Upload-Content-Length",
                source.size.as_deref().unwrap_or("0"),
            )
            .json(&serde_json::json!({
                "name": source.name,
                "parents": [destination_parent],
            }))
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("upload initiation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "upload initiation failed: status {}",
                response.status()
            )));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Upstream("upload session missing Location".to_string()))?;

        tracing::debug!(name = %source.name, "resumable upload session opened");
        let location = url::Url::parse(location)
            .map_err(|e| Error::Upstream(format!("upload session Location malformed: {}", e)))?;
        location
            .query_pairs()
            .find(|(k, _)| k == "upload_id")
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| Error::Upstream("upload session missing upload_id".to_string()))
    }

    fn upload_url(upload_id: &str) -> String {
        format!(
            "{}/files?uploadType=resumable&supportsAllDrives=true&upload_id={}",
            DRIVE_UPLOAD_BASE, upload_id
        )
    }

    /// Stream a source download into the upload slot, preserving length and
    /// content type. The handle is the only credential the slot needs.
    pub async fn relay_upload(
        &self,
        source: reqwest::Response,
        upload_id: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.put(Self::upload_url(upload_id));

        for name in [header::CONTENT_LENGTH, header::CONTENT_TYPE] {
            if let Some(value) = source.headers().get(&name) {
                request = request.header(name, value.clone());
            }
        }

        request
            .body(reqwest::Body::wrap_stream(source.bytes_stream()))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("upload relay failed: {}", e)))
    }

    /// Poll the upload slot and interpret the status tri-state.
    pub async fn poll_upload(&self, upload_id: &str) -> Result<UploadPoll> {
        let response = self
            .http
            .put(Self::upload_url(upload_id))
            .header(header::CONTENT_RANGE, "bytes */*")
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("upload poll failed: {}", e)))?;

        let status = response.status().as_u16();
        if status == 200 {
            let file: DriveFile = response
                .json()
                .await
                .map_err(|e| Error::Upstream(format!("upload poll response malformed: {}", e)))?;
            return Ok(UploadPoll::Uploaded { file });
        }

        let range = response
            .headers()
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        poll_from_status(status, range.as_deref())
    }

    async fn json_call<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        auth: String,
    ) -> Result<T> {
        let response = request
            .header(header::AUTHORIZATION, auth)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("API call failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "API call failed: status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("API response malformed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_escapes_terms() {
        assert_eq!(
            search_query("annual report"),
            "fullText contains 'annual' and fullText contains 'report' and trashed = false"
        );
        assert_eq!(
            search_query(r"o'brien c:\docs"),
            r"fullText contains 'o\'brien' and fullText contains 'c:\\docs' and trashed = false"
        );
    }

    #[test]
    fn test_search_query_empty_keeps_trash_filter() {
        assert_eq!(search_query(""), "trashed = false");
        assert_eq!(search_query("   "), "trashed = false");
    }

    #[test]
    fn test_uploaded_bytes_counts_from_end_offset() {
        assert_eq!(uploaded_bytes("bytes=0-4095"), 4096);
        assert_eq!(uploaded_bytes("bytes=0-0"), 1);
        assert_eq!(uploaded_bytes("garbage"), 0);
    }

    #[test]
    fn test_poll_status_mapping() {
        assert!(matches!(
            poll_from_status(404, None),
            Ok(UploadPoll::Expired)
        ));
        assert!(matches!(
            poll_from_status(308, Some("bytes=0-4095")),
            Ok(UploadPoll::Uploading { uploaded: 4096 })
        ));
        assert!(matches!(
            poll_from_status(308, None),
            Ok(UploadPoll::Uploading { uploaded: 0 })
        ));
        assert!(matches!(
            poll_from_status(500, None),
            Err(Error::UnexpectedStatus(500))
        ));
    }

    #[test]
    fn test_upload_url_carries_handle() {
        let url = DriveClient::upload_url("abc123");
        assert!(url.contains("uploadType=resumable"));
        assert!(url.ends_with("upload_id=abc123"));
    }
}
