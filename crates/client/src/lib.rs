//! Async client for the TransfertPro file-storage service.
//!
//! The client authenticates with an API key pair plus user credentials,
//! resolves slash-delimited remote paths against the directory tree, and
//! moves files in both directions — chunked uploads for large files,
//! streamed downloads published atomically on the local side.
//!
//! ```no_run
//! use transfertpro_client::{Client, Tenant};
//!
//! # async fn run() -> Result<(), transfertpro_client::Error> {
//! let mut client = Client::new("api-key", "secret-key", Tenant::Default)?;
//! client.connect("user@example.com", "password").await?;
//!
//! client.upload_file("./report.txt", "/Workspace/project/docs", false).await?;
//! let names = client.list_files("/Workspace/project/docs", "*.txt").await?;
//! println!("remote files: {names:?}");
//! # Ok(())
//! # }
//! ```
//!
//! A client instance is strictly sequential: operations take `&mut self`
//! and one network call is outstanding at a time.

mod api;
mod config;
mod directory;
mod download;
mod error;
mod session;
mod upload;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Endpoints, Tenant};
pub use error::Error;
pub use transfertpro_protocol::{CHUNK_SIZE, DirectoryNode, FileEntry, NIL_SHARE_ID};

use std::time::Duration;

use crate::directory::DirectoryCache;
use crate::session::Session;

/// Connection-establishment timeout applied to every call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the TransfertPro file-storage service.
///
/// Owns the session state (token, nonce counter) and the per-session
/// directory cache.
pub struct Client {
    http: reqwest::Client,
    endpoints: Endpoints,
    session: Session,
    cache: DirectoryCache,
    chunk_size: usize,
}

impl Client {
    /// Creates a client for the given tenant.
    pub fn new(api_key: &str, secret_key: &str, tenant: Tenant) -> Result<Self, Error> {
        Self::with_endpoints(api_key, secret_key, Endpoints::for_tenant(tenant))
    }

    /// Creates a client against explicit base URLs.
    pub fn with_endpoints(
        api_key: &str,
        secret_key: &str,
        endpoints: Endpoints,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoints,
            session: Session::new(api_key, secret_key),
            cache: DirectoryCache::default(),
            chunk_size: CHUNK_SIZE,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Logs in with user credentials.
    ///
    /// Re-connecting drops any cached directory listings.
    pub async fn connect(&mut self, user: &str, password: &str) -> Result<(), Error> {
        if user.is_empty() {
            return Err(Error::Validation("user must not be empty".into()));
        }
        if password.is_empty() {
            return Err(Error::Validation("password must not be empty".into()));
        }
        self.session.set_credentials(user, password);
        self.cache.clear();
        self.login().await
    }

    /// Forgets the token, its expiry, and all cached directory state.
    pub fn disconnect(&mut self) {
        self.session.clear();
        self.cache.clear();
    }

    /// Names of files in `path` whose name matches `pattern`, in the order
    /// the server returned them.
    pub async fn list_files(&mut self, path: &str, pattern: &str) -> Result<Vec<String>, Error> {
        let pattern = compile_pattern(pattern)?;
        let dir = self.resolve_path(path).await?;
        Ok(dir
            .files
            .values
            .iter()
            .filter(|f| pattern.matches(&f.file_name))
            .map(|f| f.file_name.clone())
            .collect())
    }

    /// Deletes files in `path` matching `pattern`; returns the deleted names.
    ///
    /// The batch stops at the first failure.
    pub async fn delete_files(&mut self, path: &str, pattern: &str) -> Result<Vec<String>, Error> {
        let pattern = compile_pattern(pattern)?;
        let dir = self.resolve_path(path).await?;
        let matched: Vec<FileEntry> = dir
            .files
            .values
            .iter()
            .filter(|f| pattern.matches(&f.file_name))
            .cloned()
            .collect();
        let mut deleted = Vec::with_capacity(matched.len());
        for file in &matched {
            self.delete_remote_file(&dir, file).await?;
            deleted.push(file.file_name.clone());
        }
        Ok(deleted)
    }
}

/// Compiles a shell-style glob; rejection is a caller input error.
pub(crate) fn compile_pattern(pattern: &str) -> Result<glob::Pattern, Error> {
    glob::Pattern::new(pattern)
        .map_err(|e| Error::Validation(format!("invalid pattern {pattern:?}: {e}")))
}
