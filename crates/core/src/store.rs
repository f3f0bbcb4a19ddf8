// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Access to the remote configuration store and materialization of its
//! resources into a run's scratch directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::catalog::RESOURCE_PREFIX;
use crate::context::RunScope;
use crate::error::FetchError;

/// A store holding the versioned configuration of every service.
///
/// Implementations must report a missing resource as [`FetchError::NotFound`]
/// and reserve [`FetchError::Store`] for genuine faults, so that callers can
/// tell "absent" from "unavailable".
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Returns the content of the resource at `path` for `scope`.
    async fn get(&self, scope: &RunScope, path: &str) -> Result<Bytes, FetchError>;

    /// Lists the logical paths of every resource visible to `scope`.
    async fn list(&self, scope: &RunScope) -> Result<Vec<String>, FetchError>;
}

/// Fetches resources of one scope into local files.
#[derive(Clone)]
pub struct ResourceFetcher {
    store: Arc<dyn ResourceStore>,
    scope: RunScope,
}

impl ResourceFetcher {
    pub fn new(store: Arc<dyn ResourceStore>, scope: RunScope) -> Self {
        Self { store, scope }
    }

    /// Reads a resource without materializing it.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`FetchError`] unchanged.
    pub async fn read(&self, logical_path: &str) -> Result<Bytes, FetchError> {
        self.store.get(&self.scope, logical_path).await
    }

    /// Fetches `logical_path` and writes it to `scratch_dir/<last path segment>`.
    ///
    /// Directory prefixes of the logical path are discarded, so every
    /// resource of a run lands flat in the scratch directory.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the store fails, if the path has no usable
    /// file name, or if the local file cannot be written.
    pub async fn fetch(
        &self,
        logical_path: &str,
        scratch_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let file_name = local_file_name(logical_path)?;
        let content = self.read(logical_path).await?;
        let target = scratch_dir.join(file_name);

        tokio::fs::write(&target, &content).await.map_err(|source| FetchError::Write {
            path: logical_path.to_string(),
            target: target.clone(),
            source,
        })?;

        tracing::debug!(
            path = %logical_path,
            target = %target.display(),
            bytes = content.len(),
            "Materialized resource"
        );
        Ok(target)
    }

    /// Fetches every resource under the load-test prefix accepted by `predicate`.
    ///
    /// Resources are fetched one by one; the first failure aborts the batch.
    ///
    /// # Errors
    ///
    /// Returns the first [`FetchError`] from listing or fetching.
    pub async fn fetch_all<P>(&self, scratch_dir: &Path, predicate: P) -> Result<usize, FetchError>
    where
        P: Fn(&str) -> bool + Send + Sync,
    {
        let paths = self.store.list(&self.scope).await?;
        let mut count = 0;
        for path in paths.iter().filter(|p| p.starts_with(RESOURCE_PREFIX) && predicate(p)) {
            self.fetch(path, scratch_dir).await?;
            count += 1;
        }
        tracing::debug!(scope = %self.scope, count, "Fetched sibling resources");
        Ok(count)
    }
}

fn local_file_name(logical_path: &str) -> Result<&str, FetchError> {
    match logical_path.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
        _ => Err(FetchError::store(logical_path, "logical path has no file name")),
    }
}
