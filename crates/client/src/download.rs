//! Download engine and remote deletion.
//!
//! Bodies stream into a temporary file in the destination directory and are
//! renamed into place only after the whole body arrived, so an interrupted
//! download never leaves a truncated file under the final name.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use transfertpro_protocol::{DirectoryNode, FileEntry};

use crate::{Client, Error, compile_pattern};

impl Client {
    /// Downloads the file at `remote_path` into `target_dir`.
    ///
    /// Returns the path of the written file. With `move_source`, the remote
    /// file is deleted once the local copy is in place.
    pub async fn download_file(
        &mut self,
        remote_path: &str,
        target_dir: impl AsRef<Path>,
        move_source: bool,
    ) -> Result<PathBuf, Error> {
        let (dir_path, file_name) = split_remote_path(remote_path)?;
        let dir = self.resolve_path(dir_path).await?;
        let entry = dir
            .files
            .values
            .iter()
            .find(|f| f.file_name == file_name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{dir_path}/{file_name}")))?;
        self.fetch_file(&dir, &entry, target_dir.as_ref(), move_source)
            .await
    }

    /// Downloads every file in `remote_dir` matching `pattern` into
    /// `target_dir`; returns the downloaded names.
    ///
    /// The batch stops at the first failure.
    pub async fn download_files(
        &mut self,
        remote_dir: &str,
        pattern: &str,
        target_dir: impl AsRef<Path>,
        move_source: bool,
    ) -> Result<Vec<String>, Error> {
        let pattern = compile_pattern(pattern)?;
        let dir = self.resolve_path(remote_dir).await?;
        let matched: Vec<FileEntry> = dir
            .files
            .values
            .iter()
            .filter(|f| pattern.matches(&f.file_name))
            .cloned()
            .collect();
        let mut downloaded = Vec::with_capacity(matched.len());
        for entry in &matched {
            self.fetch_file(&dir, entry, target_dir.as_ref(), move_source)
                .await?;
            downloaded.push(entry.file_name.clone());
        }
        Ok(downloaded)
    }

    /// Streams one file to disk, publishing it atomically.
    async fn fetch_file(
        &mut self,
        dir: &DirectoryNode,
        entry: &FileEntry,
        target_dir: &Path,
        move_source: bool,
    ) -> Result<PathBuf, Error> {
        let target = target_dir.join(&entry.file_name);
        // Same filesystem as the target, so the final rename is atomic.
        let mut tmp = tempfile::Builder::new()
            .prefix("tp")
            .tempfile_in(target_dir)?;
        if let Err(err) = self.stream_into(dir, entry, &mut tmp).await {
            // Dropping the handle removes the partial file.
            return Err(err.with_file_context(&entry.file_name));
        }
        tmp.persist(&target)
            .map_err(|e| Error::from(e.error).with_file_context(&entry.file_name))?;
        if move_source {
            self.delete_remote_file(dir, entry).await?;
        }
        debug!(file = %entry.file_name, target = %target.display(), "download complete");
        Ok(target)
    }

    async fn stream_into(
        &mut self,
        dir: &DirectoryNode,
        entry: &FileEntry,
        out: &mut NamedTempFile,
    ) -> Result<(), Error> {
        self.ensure_connected().await?;
        let url = format!("{}/download/myfile", self.endpoints.download);
        let mut params: Vec<(String, String)> = vec![
            ("i".into(), entry.id.clone()),
            ("n".into(), entry.file_name.clone()),
        ];
        if let Some(share) = dir.share_context() {
            params.push(("s".into(), share.to_string()));
        }
        params.extend(self.session.sign_request());

        let req = self.authorize(self.http.get(&url).query(&params));
        let mut resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transfer {
                context: format!("download returned status {status}"),
                status: Some(status.as_u16()),
                body,
            });
        }
        while let Some(bytes) = resp.chunk().await? {
            out.write_all(&bytes)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Deletes one remote file, scoped to the directory's share context when
    /// it has one.
    pub(crate) async fn delete_remote_file(
        &mut self,
        dir: &DirectoryNode,
        file: &FileEntry,
    ) -> Result<(), Error> {
        let operation = match dir.share_context() {
            Some(share) => format!("/api/v5/File/{}/share/{share}", file.id),
            None => format!("/api/v5/File/{}", file.id),
        };
        self.api_delete(&operation).await
    }
}

/// Splits `/Workspace/project/report.txt` into the directory path and the
/// file name.
fn split_remote_path(remote_path: &str) -> Result<(&str, &str), Error> {
    let trimmed = remote_path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((dir, name)) if !name.is_empty() => Ok((dir, name)),
        _ => Err(Error::Validation(format!(
            "{remote_path:?} is not a remote file path"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testutil::{MockServer, Recorded, dir_json, file_json, test_client, token_json};

    #[test]
    fn split_remote_path_cases() {
        assert_eq!(
            split_remote_path("/Workspace/docs/report.txt").unwrap(),
            ("/Workspace/docs", "report.txt")
        );
        assert_eq!(split_remote_path("/a/b/").unwrap(), ("/a", "b"));
        assert!(split_remote_path("report.txt").is_err());
        assert!(split_remote_path("/").is_err());
    }

    /// One shared directory with two files; `/download/myfile` serves the
    /// content for `f-1` with the status given.
    fn download_responder(
        status: u16,
        content: &'static str,
    ) -> impl Fn(&Recorded) -> (u16, String) + Send + Sync + 'static {
        move |req| match req.path() {
            "/Token" => (200, token_json()),
            "/api/v5/Directory/Root" => (
                200,
                dir_json(
                    "dir-root",
                    "Root",
                    None,
                    vec![dir_json("ws-1", "Workspace", Some("sh-1"), vec![], vec![])],
                    vec![],
                )
                .to_string(),
            ),
            "/api/v5/Directory/ws-1" => (
                200,
                dir_json(
                    "ws-1",
                    "Workspace",
                    Some("sh-1"),
                    vec![],
                    vec![
                        file_json("f-1", "report.txt", 11),
                        file_json("f-2", "notes.md", 5),
                    ],
                )
                .to_string(),
            ),
            "/download/myfile" => (status, content.to_string()),
            p if p.starts_with("/api/v5/File/") && req.method == "DELETE" => {
                (200, String::new())
            }
            other => (404, format!("{{\"error\":\"no route {other}\"}}")),
        }
    }

    #[tokio::test]
    async fn download_writes_the_file_atomically() {
        let server = MockServer::start(download_responder(200, "hello bytes")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        let out = TempDir::new().unwrap();
        let path = client
            .download_file("/Workspace/report.txt", out.path(), false)
            .await
            .unwrap();

        assert_eq!(path, out.path().join("report.txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello bytes");
        // No temp file left behind.
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);

        let dl = server
            .recorded()
            .into_iter()
            .find(|r| r.path() == "/download/myfile")
            .unwrap();
        assert!(dl.query_has("i=f-1"), "{}", dl.target);
        assert!(dl.query_has("n=report.txt"), "{}", dl.target);
        assert!(dl.query_has("s=sh-1"), "{}", dl.target);
        assert!(dl.query_param("hashkey"), "{}", dl.target);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let server = MockServer::start(download_responder(404, "gone")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        let out = TempDir::new().unwrap();
        let err = client
            .download_file("/Workspace/report.txt", out.path(), false)
            .await
            .unwrap_err();

        match err {
            Error::Transfer { context, status, .. } => {
                assert!(context.contains("report.txt"), "{context}");
                assert_eq!(status, Some(404));
            }
            other => panic!("expected Transfer, got {other}"),
        }
        assert_eq!(
            std::fs::read_dir(out.path()).unwrap().count(),
            0,
            "neither the target nor a temp file may remain"
        );
    }

    #[tokio::test]
    async fn persist_failure_names_the_file() {
        let server = MockServer::start(download_responder(200, "hello")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        // A directory squatting on the target name makes the final rename
        // fail after the body streamed successfully.
        let out = TempDir::new().unwrap();
        std::fs::create_dir(out.path().join("report.txt")).unwrap();

        let err = client
            .download_file("/Workspace/report.txt", out.path(), false)
            .await
            .unwrap_err();
        match err {
            Error::Transfer { context, .. } => {
                assert!(context.contains("report.txt"), "{context}");
            }
            other => panic!("expected Transfer, got {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_remote_file_is_not_found() {
        let server = MockServer::start(download_responder(200, "x")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        let out = TempDir::new().unwrap();
        let err = client
            .download_file("/Workspace/missing.txt", out.path(), false)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::NotFound { ref path } if path == "/Workspace/missing.txt"),
            "{err}"
        );
        assert_eq!(server.hits("/download"), 0);
    }

    #[tokio::test]
    async fn bare_file_name_is_rejected() {
        let server = MockServer::start(download_responder(200, "x")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        let out = TempDir::new().unwrap();
        let err = client
            .download_file("report.txt", out.path(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[tokio::test]
    async fn move_deletes_the_remote_file() {
        let server = MockServer::start(download_responder(200, "hello")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        let out = TempDir::new().unwrap();
        client
            .download_file("/Workspace/report.txt", out.path(), true)
            .await
            .unwrap();

        let deletes: Vec<_> = server
            .recorded()
            .into_iter()
            .filter(|r| r.method == "DELETE")
            .collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].path(), "/api/v5/File/f-1/share/sh-1");
        assert!(out.path().join("report.txt").exists());
    }

    #[tokio::test]
    async fn download_files_fetches_only_matches() {
        let server = MockServer::start(download_responder(200, "body")).await;
        let mut client = test_client(&server);
        client.connect("user@example.com", "pw").await.unwrap();

        let out = TempDir::new().unwrap();
        let names = client
            .download_files("/Workspace", "*.txt", out.path(), false)
            .await
            .unwrap();

        assert_eq!(names, vec!["report.txt"]);
        assert!(out.path().join("report.txt").exists());
        assert!(!out.path().join("notes.md").exists());
        assert_eq!(server.hits("/download"), 1);
    }
}
