//! Wire types for the Drive v3 surface the proxy consumes and re-emits.
//!
//! Node metadata is transient: fetched, filtered, serialized back out, never
//! cached beyond one response cycle.

use serde::{Deserialize, Serialize};

/// Remote file (or folder) metadata.
///
/// Fields mirror the `fields` projections the client requests; everything
/// is optional because listing and single-node calls project differently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size in bytes; the upstream API serializes it as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
}

/// A top-level shared drive. Shares an id-space with files upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveCollection {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Client-visible page of a listing or search.
///
/// `next_page_token` is always a sealed continuation token, never the raw
/// upstream cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<DriveFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drives: Option<Vec<DriveCollection>>,
}

/// Response to a relay initiation: the source node's metadata plus the
/// upstream resumable-upload handle the caller must echo back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyInit {
    #[serde(flatten)]
    pub file: DriveFile,
    pub token: String,
}

/// Tri-state interpretation of the resumable-upload poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadPoll {
    Uploaded {
        #[serde(flatten)]
        file: DriveFile,
    },
    Expired,
    Uploading {
        uploaded: u64,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_camel_case() {
        let json = r#"{"id":"f1","name":"a.txt","mimeType":"text/plain",
                       "size":"42","modifiedTime":"2024-01-01T00:00:00Z"}"#;
        let file: DriveFile = serde_json::from_str(json).unwrap();

        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(file.size.as_deref(), Some("42"));

        let out = serde_json::to_value(&file).unwrap();
        assert_eq!(out["mimeType"], "text/plain");
        assert!(out.get("parents").is_none());
    }

    #[test]
    fn test_file_list_omits_absent_sections() {
        let list = FileList {
            next_page_token: None,
            files: Some(vec![]),
            drives: None,
        };
        let out = serde_json::to_value(&list).unwrap();

        assert!(out.get("nextPageToken").is_none());
        assert!(out.get("drives").is_none());
        assert_eq!(out["files"], serde_json::json!([]));
    }

    #[test]
    fn test_upload_poll_status_tags() {
        let uploading = serde_json::to_value(UploadPoll::Uploading { uploaded: 4096 }).unwrap();
        assert_eq!(uploading["status"], "uploading");
        assert_eq!(uploading["uploaded"], 4096);

        let expired = serde_json::to_value(UploadPoll::Expired).unwrap();
        assert_eq!(expired["status"], "expired");

        let error = serde_json::to_value(UploadPoll::Error {
            message: "unexpected API response status: 500".to_string(),
        })
        .unwrap();
        assert_eq!(error["status"], "error");

        let uploaded = serde_json::to_value(UploadPoll::Uploaded {
            file: DriveFile {
                id: "f1".to_string(),
                name: "a".to_string(),
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(uploaded["status"], "uploaded");
        assert_eq!(uploaded["id"], "f1");
    }

    #[test]
    fn test_copy_init_flattens_file() {
        let init = CopyInit {
            file: DriveFile {
                id: "src".to_string(),
                name: "big.bin".to_string(),
                ..Default::default()
            },
            token: "upload-123".to_string(),
        };
        let out = serde_json::to_value(&init).unwrap();

        assert_eq!(out["id"], "src");
        assert_eq!(out["token"], "upload-123");
    }
}
