//! Directory-tree path resolution with a per-session cache.
//!
//! Paths are slash-delimited; the first segment names a top-level root
//! (private files or the shared workspace), the rest walk the tree. Every
//! node fetched in a session is cached by directory id, so re-resolving a
//! subtree costs no network calls.

use std::collections::HashMap;

use transfertpro_protocol::DirectoryNode;

use crate::{Client, Error};

/// Per-session cache of fetched directory nodes.
///
/// Within one session each id maps to exactly one fetched node; entries are
/// dropped only by an explicit refresh or reconnect.
#[derive(Debug, Default)]
pub(crate) struct DirectoryCache {
    roots: Option<Vec<DirectoryNode>>,
    nodes: HashMap<String, DirectoryNode>,
}

impl DirectoryCache {
    pub(crate) fn clear(&mut self) {
        self.roots = None;
        self.nodes.clear();
    }

    fn get(&self, id: &str) -> Option<&DirectoryNode> {
        self.nodes.get(id)
    }

    fn insert(&mut self, node: &DirectoryNode) {
        self.nodes
            .insert(node.directory_id.clone(), node.clone());
    }

    /// Inserts a node and every descendant reachable through it.
    fn insert_subtree(&mut self, node: &DirectoryNode) {
        self.insert(node);
        for child in &node.directories.values {
            self.insert_subtree(child);
        }
    }

    /// Walks `names` downward from `start_id` using cached entries only.
    fn walk(&self, start_id: &str, names: &[String]) -> Option<DirectoryNode> {
        let mut current = self.get(start_id)?;
        for name in names {
            let child = current
                .directories
                .values
                .iter()
                .find(|d| d.directory_name == *name)?;
            current = self.get(&child.directory_id)?;
        }
        Some(current.clone())
    }
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Client {
    /// Resolves a slash-delimited logical path to its directory node.
    ///
    /// Cached subtrees resolve without network calls. An unknown root or a
    /// missing intermediate segment fails with [`Error::NotFound`] naming
    /// the partial path reached so far.
    pub async fn resolve_path(&mut self, path: &str) -> Result<DirectoryNode, Error> {
        let mut names = path_segments(path);
        if names.is_empty() {
            return Err(Error::Validation(format!(
                "path {path:?} has no segments"
            )));
        }
        let root_name = names.remove(0);
        let root = self.find_root(&root_name).await?;
        if names.is_empty() {
            return self.node(root).await;
        }
        if let Some(found) = self.cache.walk(&root.directory_id, &names) {
            return Ok(found);
        }
        self.find_below(root, &names).await
    }

    /// Drops every cached directory listing; the next resolution refetches.
    pub fn refresh(&mut self) {
        self.cache.clear();
    }

    /// Matches the first path segment against the top-level roots.
    ///
    /// Returns the entry from the roots listing without materializing it;
    /// callers descending further list the subtree themselves.
    async fn find_root(&mut self, name: &str) -> Result<DirectoryNode, Error> {
        if self.cache.roots.is_none() {
            let listing: DirectoryNode = self.api_get("/api/v5/Directory/Root").await?;
            self.cache.roots = Some(listing.directories.values);
        }
        self.cache
            .roots
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|d| d.directory_name == name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("/{name}")))
    }

    /// Returns the full node for `entry`, from cache or a one-level listing.
    async fn node(&mut self, entry: DirectoryNode) -> Result<DirectoryNode, Error> {
        if let Some(n) = self.cache.get(&entry.directory_id) {
            return Ok(n.clone());
        }
        self.list_directory(&entry.directory_id).await
    }

    /// Single-level listing: `GET /api/v5/Directory/{id}`.
    async fn list_directory(&mut self, id: &str) -> Result<DirectoryNode, Error> {
        let node: DirectoryNode = self.api_get(&format!("/api/v5/Directory/{id}")).await?;
        self.cache.insert(&node);
        Ok(node)
    }

    /// Depth-bounded recursive listing: `GET /api/v5/Directory/{id}/{depth}`.
    async fn list_recursive(&mut self, id: &str, depth: usize) -> Result<DirectoryNode, Error> {
        let node: DirectoryNode = self
            .api_get(&format!("/api/v5/Directory/{id}/{depth}"))
            .await?;
        self.cache.insert_subtree(&node);
        Ok(node)
    }

    /// Resolves `names` below `start` with one recursive listing bounded by
    /// the remaining depth, falling back to one single-level listing per
    /// segment when an intermediate node came back without children.
    async fn find_below(
        &mut self,
        start: DirectoryNode,
        names: &[String],
    ) -> Result<DirectoryNode, Error> {
        let mut current_path = format!("/{}", start.directory_name);
        let mut current = self
            .list_recursive(&start.directory_id, names.len())
            .await?;
        for name in names {
            current_path.push('/');
            current_path.push_str(name);
            let found = current
                .directories
                .values
                .iter()
                .find(|d| d.directory_name == *name)
                .cloned();
            current = match found {
                Some(node) => node,
                None if current.directories.values.is_empty() => {
                    // The bounded listing stopped short of this level.
                    let listed = self.list_directory(&current.directory_id).await?;
                    listed
                        .directories
                        .values
                        .iter()
                        .find(|d| d.directory_name == *name)
                        .cloned()
                        .ok_or_else(|| Error::not_found(current_path.clone()))?
                }
                None => return Err(Error::not_found(current_path)),
            };
        }
        self.node(current).await
    }
}
