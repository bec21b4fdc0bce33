//! Upload engine: metadata registration, then direct or chunked transfer.
//!
//! Files below the chunk-size threshold go up as a single transfer call
//! (chunk 0 of 1); larger files are cut into sequential fixed-size chunks,
//! each sent with its own signed request and a bounded retry budget.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};
use uuid::Uuid;

use transfertpro_protocol::{DirectoryNode, FileDescriptor};

use crate::{Client, Error};

/// Attempts made for one chunk before the whole upload is abandoned.
const CHUNK_RETRY_LIMIT: u32 = 10;

/// One byte range of the source file, tagged for server-side reassembly.
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    pub index: u64,
    pub count: u64,
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Reads a local file as a sequence of fixed-size chunks.
///
/// Offsets are strictly increasing and contiguous; the last chunk carries
/// the remainder.
pub(crate) struct ChunkReader {
    file: File,
    chunk_size: u64,
    size: u64,
    offset: u64,
    index: u64,
    count: u64,
}

impl ChunkReader {
    pub(crate) fn open(path: &Path, chunk_size: u64) -> Result<Self, Error> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            chunk_size,
            size,
            offset: 0,
            index: 0,
            count: size.div_ceil(chunk_size),
        })
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    /// Reads the next chunk. Returns `None` once the file is exhausted.
    pub(crate) fn next_chunk(&mut self) -> Result<Option<Chunk>, Error> {
        if self.offset >= self.size {
            return Ok(None);
        }
        let len = (self.size - self.offset).min(self.chunk_size) as usize;
        let mut data = vec![0u8; len];
        self.file.read_exact(&mut data)?;
        let chunk = Chunk {
            index: self.index,
            count: self.count,
            offset: self.offset,
            data,
        };
        self.offset += len as u64;
        self.index += 1;
        Ok(Some(chunk))
    }
}

impl Client {
    /// Uploads one local file into the directory at `target`.
    ///
    /// With `move_source`, the local file is deleted once the transfer has
    /// fully succeeded.
    pub async fn upload_file(
        &mut self,
        local_path: impl AsRef<Path>,
        target: &str,
        move_source: bool,
    ) -> Result<(), Error> {
        let dir = self.resolve_path(target).await?;
        self.upload_file_to(local_path, &dir, move_source).await
    }

    /// Uploads one local file into an already-resolved directory.
    pub async fn upload_file_to(
        &mut self,
        local_path: impl AsRef<Path>,
        dir: &DirectoryNode,
        move_source: bool,
    ) -> Result<(), Error> {
        let local_path = local_path.as_ref();
        let descriptor = describe(local_path, dir)?;
        self.register_upload(&descriptor, dir).await?;
        self.transfer_content(local_path, &descriptor, dir).await?;
        debug!(file = %descriptor.file_name, upload_id = %descriptor.upload_id, "upload complete");
        if move_source {
            std::fs::remove_file(local_path)?;
        }
        Ok(())
    }

    /// Uploads every local file under `source_dir` matching `pattern`.
    ///
    /// Returns the uploaded file names. The batch stops at the first
    /// failure.
    pub async fn upload_files(
        &mut self,
        source_dir: &str,
        pattern: &str,
        target: &str,
        move_source: bool,
    ) -> Result<Vec<String>, Error> {
        let dir = self.resolve_path(target).await?;
        let full = format!("{source_dir}/{pattern}");
        let paths = glob::glob(&full)
            .map_err(|e| Error::Validation(format!("invalid pattern {full:?}: {e}")))?;
        let mut uploaded = Vec::new();
        for entry in paths {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if !path.is_file() {
                continue;
            }
            self.upload_file_to(&path, &dir, move_source).await?;
            uploaded.push(file_name_of(&path)?);
        }
        Ok(uploaded)
    }

    /// Registers file metadata ahead of the content transfer, scoped to the
    /// directory's share context when it has one.
    async fn register_upload(
        &mut self,
        descriptor: &FileDescriptor,
        dir: &DirectoryNode,
    ) -> Result<(), Error> {
        let operation = match dir.share_context() {
            Some(share) => format!("/api/v5/File/share/{share}"),
            None => "/api/v5/File".to_string(),
        };
        self.api_post(&operation, descriptor).await
    }

    async fn transfer_content(
        &mut self,
        path: &Path,
        descriptor: &FileDescriptor,
        dir: &DirectoryNode,
    ) -> Result<(), Error> {
        if (descriptor.file_size as usize) < self.chunk_size {
            let mut data = Vec::with_capacity(descriptor.file_size as usize);
            File::open(path)?.read_to_end(&mut data)?;
            let chunk = Chunk {
                index: 0,
                count: 1,
                offset: 0,
                data,
            };
            return self.send_chunk(descriptor, dir, chunk).await;
        }

        let mut reader = ChunkReader::open(path, self.chunk_size as u64)?;
        while let Some(chunk) = reader.next_chunk()? {
            self.send_chunk(descriptor, dir, chunk).await?;
        }
        Ok(())
    }

    /// Sends one chunk, retrying up to [`CHUNK_RETRY_LIMIT`] times.
    ///
    /// Every attempt is signed with its own nonce; exhausting the budget
    /// fails the whole upload.
    async fn send_chunk(
        &mut self,
        descriptor: &FileDescriptor,
        dir: &DirectoryNode,
        chunk: Chunk,
    ) -> Result<(), Error> {
        self.ensure_connected().await?;
        let url = format!("{}/Chunk", self.endpoints.upload);
        let mut last_failure = String::new();

        for attempt in 1..=CHUNK_RETRY_LIMIT {
            let mut params: Vec<(String, String)> = vec![
                ("uid".into(), descriptor.upload_id.clone()),
                ("name".into(), descriptor.file_name.clone()),
                ("chunk".into(), chunk.index.to_string()),
                ("chunks".into(), chunk.count.to_string()),
                ("offset".into(), chunk.offset.to_string()),
                ("o".into(), "true".into()),
                ("sender".into(), self.session.user().to_string()),
            ];
            if let Some(share) = dir.share_context() {
                params.push(("share".into(), share.to_string()));
            }
            params.extend(self.session.sign_request());

            let part = Part::bytes(chunk.data.clone()).file_name(descriptor.file_name.clone());
            let form = Form::new().part("file", part);
            let req = self.authorize(self.http.post(&url).query(&params).multipart(form));

            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(
                        file = %descriptor.file_name,
                        chunk = chunk.index,
                        chunks = chunk.count,
                        offset = chunk.offset,
                        "chunk uploaded"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        file = %descriptor.file_name,
                        chunk = chunk.index,
                        attempt,
                        status,
                        "chunk upload rejected"
                    );
                    last_failure = format!("status {status}: {body}");
                }
                Err(err) => {
                    warn!(
                        file = %descriptor.file_name,
                        chunk = chunk.index,
                        attempt,
                        error = %err,
                        "chunk upload failed"
                    );
                    last_failure = err.to_string();
                }
            }
        }

        Err(Error::transfer(format!(
            "chunk {}/{} of {} failed after {CHUNK_RETRY_LIMIT} attempts: {last_failure}",
            chunk.index, chunk.count, descriptor.file_name
        )))
    }
}

/// Builds the per-upload transfer metadata for a local file.
fn describe(path: &Path, dir: &DirectoryNode) -> Result<FileDescriptor, Error> {
    let size = std::fs::metadata(path)?.len();
    Ok(FileDescriptor {
        upload_id: Uuid::new_v4().to_string(),
        file_name: file_name_of(path)?,
        file_size: size,
        directory_id: dir.directory_id.clone(),
    })
}

fn file_name_of(path: &Path) -> Result<String, Error> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Validation(format!("{} has no file name", path.display())))
}
