// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! [`ResourceStore`] adapters: the Keptn configuration service and a local
//! directory for running without a control plane.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use locust_service_core::{FetchError, ResourceStore, RunScope};
use reqwest::StatusCode;
use serde::Deserialize;

const PAGE_SIZE: usize = 50;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Resource {
    #[serde(rename = "resourceURI")]
    resource_uri: String,
    #[serde(default)]
    resource_content: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ResourcePage {
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    next_page_key: Option<String>,
}

/// Reads resources from the Keptn configuration service.
///
/// A resource missing on the service level is looked up on the stage level and
/// then on the project level, so a project-wide script is visible to every
/// service.
#[derive(Clone)]
pub struct ConfigurationServiceStore {
    client: reqwest::Client,
    base_url: String,
}

impl ConfigurationServiceStore {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string() }
    }

    fn service_url(&self, scope: &RunScope) -> String {
        format!(
            "{}/v1/project/{}/stage/{}/service/{}/resource",
            self.base_url,
            urlencoding::encode(&scope.project),
            urlencoding::encode(&scope.stage),
            urlencoding::encode(&scope.service)
        )
    }

    /// Resource collection URLs from the most to the least specific level.
    fn layered_urls(&self, scope: &RunScope) -> [String; 3] {
        let project =
            format!("{}/v1/project/{}", self.base_url, urlencoding::encode(&scope.project));
        let stage = format!("{project}/stage/{}", urlencoding::encode(&scope.stage));
        [self.service_url(scope), format!("{stage}/resource"), format!("{project}/resource")]
    }
}

#[async_trait]
impl ResourceStore for ConfigurationServiceStore {
    async fn get(&self, scope: &RunScope, path: &str) -> Result<Bytes, FetchError> {
        let encoded = urlencoding::encode(path);
        for collection in self.layered_urls(scope) {
            let url = format!("{collection}/{encoded}");
            let response =
                self.client.get(&url).send().await.map_err(|e| FetchError::store(path, e))?;

            if response.status() == StatusCode::NOT_FOUND {
                tracing::debug!(%url, "Resource not found on this level");
                continue;
            }
            if !response.status().is_success() {
                return Err(FetchError::store(path, unexpected_response(response).await));
            }

            let resource: Resource =
                response.json().await.map_err(|e| FetchError::store(path, e))?;
            let content = base64::engine::general_purpose::STANDARD
                .decode(resource.resource_content.trim())
                .map_err(|e| FetchError::store(path, format!("invalid resource content: {e}")))?;
            return Ok(Bytes::from(content));
        }
        Err(FetchError::NotFound { path: path.to_string() })
    }

    async fn list(&self, scope: &RunScope) -> Result<Vec<String>, FetchError> {
        let url = self.service_url(scope);
        let mut paths = Vec::new();
        let mut next_page_key = String::new();

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("pageSize", PAGE_SIZE.to_string()),
                    ("nextPageKey", next_page_key.clone()),
                ])
                .send()
                .await
                .map_err(|e| FetchError::store(&url, e))?;
            if !response.status().is_success() {
                return Err(FetchError::store(&url, unexpected_response(response).await));
            }

            let page: ResourcePage =
                response.json().await.map_err(|e| FetchError::store(&url, e))?;
            paths.extend(
                page.resources
                    .into_iter()
                    .map(|r| r.resource_uri.trim_start_matches('/').to_string()),
            );

            match page.next_page_key {
                Some(key) if !key.is_empty() && key != "0" => next_page_key = key,
                _ => break,
            }
        }
        Ok(paths)
    }
}

/// Describes a non-success response, including its body.
async fn unexpected_response(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("configuration service returned {status}: {body}")
}

/// Reads resources from a directory laid out like the configuration repository.
///
/// Logical paths are resolved relative to the root; the scope is ignored.
#[derive(Debug, Clone)]
pub struct LocalDirectoryStore {
    root: PathBuf,
}

impl LocalDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, std::path::Component::Normal(_))) {
            return Err(FetchError::store(path, "path escapes the resource directory"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceStore for LocalDirectoryStore {
    async fn get(&self, _scope: &RunScope, path: &str) -> Result<Bytes, FetchError> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound { path: path.to_string() })
            },
            Err(e) => Err(FetchError::store(path, e)),
        }
    }

    async fn list(&self, _scope: &RunScope) -> Result<Vec<String>, FetchError> {
        let mut paths = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let dir_error = |e: std::io::Error| FetchError::store(dir.display().to_string(), e);
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(dir_error)?;
            while let Some(entry) = entries.next_entry().await.map_err(dir_error)? {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| FetchError::store(path.display().to_string(), e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let logical: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    paths.push(logical.join("/"));
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scope() -> RunScope {
        RunScope {
            project: "sockshop".to_string(),
            stage: "staging".to_string(),
            service: "carts".to_string(),
        }
    }

    #[test]
    fn test_layered_urls() {
        let store = ConfigurationServiceStore::new(reqwest::Client::new(), "http://cs:8080/");
        let urls = store.layered_urls(&scope());
        assert_eq!(
            urls[0],
            "http://cs:8080/v1/project/sockshop/stage/staging/service/carts/resource"
        );
        assert_eq!(urls[1], "http://cs:8080/v1/project/sockshop/stage/staging/resource");
        assert_eq!(urls[2], "http://cs:8080/v1/project/sockshop/resource");
    }

    #[tokio::test]
    async fn test_local_store_reads_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("locust/data")).unwrap();
        std::fs::write(dir.path().join("locust/load.py"), "# load").unwrap();
        std::fs::write(dir.path().join("locust/data/users.csv"), "a,b").unwrap();
        std::fs::write(dir.path().join("locustfile.py"), "# default").unwrap();
        let store = LocalDirectoryStore::new(dir.path());

        assert_eq!(store.get(&scope(), "locust/load.py").await.unwrap(), Bytes::from("# load"));
        assert_eq!(
            store.list(&scope()).await.unwrap(),
            vec!["locust/data/users.csv", "locust/load.py", "locustfile.py"]
        );
    }

    #[tokio::test]
    async fn test_local_store_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirectoryStore::new(dir.path());
        let err = store.get(&scope(), "locust/locust.conf.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_local_store_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDirectoryStore::new(dir.path());
        let err = store.get(&scope(), "../secrets.txt").await.unwrap_err();
        assert!(matches!(err, FetchError::Store { .. }));
    }
}
