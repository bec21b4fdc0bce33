use serde::{Deserialize, Serialize};

use crate::NIL_SHARE_ID;

/// Array envelope used throughout the TransfertPro API.
///
/// Every JSON array arrives wrapped as `{"$values": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Values<T> {
    #[serde(rename = "$values", default)]
    pub values: Vec<T>,
}

impl<T> Default for Values<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T> From<Vec<T>> for Values<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

/// A directory on the remote file system, as returned by listing calls.
///
/// Listing responses nest child directories inside `Directories` (one level
/// for `GET /Directory/{id}`, up to the requested depth for
/// `GET /Directory/{id}/{depth}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DirectoryNode {
    pub directory_id: String,
    pub directory_name: String,
    pub current_shared_directory_id: Option<String>,
    pub directories: Values<DirectoryNode>,
    pub files: Values<FileEntry>,
}

impl DirectoryNode {
    /// Returns the share context id, unless it is absent, empty, or the nil
    /// sentinel.
    pub fn share_context(&self) -> Option<&str> {
        match self.current_shared_directory_id.as_deref() {
            None | Some("") | Some(NIL_SHARE_ID) => None,
            Some(id) => Some(id),
        }
    }
}

/// A file inside a directory listing. Read-only snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileEntry {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
}

/// Transfer metadata registered with the server before content is sent.
///
/// Created per upload with a freshly generated id; never persisted beyond
/// the transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileDescriptor {
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub directory_id: String,
}

/// Body of a successful `POST /Token` login exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = ".expires", default)]
    pub expires: String,
    pub access_token: String,
}
