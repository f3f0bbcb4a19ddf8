// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! [`SecretStore`] adapters.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use locust_service_core::{SecretError, SecretStore};
use reqwest::StatusCode;
use serde::Deserialize;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Deserialize, Debug)]
struct SecretObject {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// Reads secrets through the Kubernetes API.
#[derive(Clone)]
pub struct KubernetesSecretStore {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl KubernetesSecretStore {
    pub fn new(client: reqwest::Client, api_url: &str, token: Option<String>) -> Self {
        Self { client, api_url: api_url.trim_end_matches('/').to_string(), token }
    }

    /// Uses the pod's service account to reach the API server.
    ///
    /// # Errors
    ///
    /// Returns an error when not running inside a cluster, or when the service
    /// account token or CA certificate cannot be read.
    pub fn in_cluster(timeout: std::time::Duration) -> anyhow::Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .context("KUBERNETES_SERVICE_HOST is not set")?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        let account = PathBuf::from(SERVICE_ACCOUNT_DIR);

        let token = std::fs::read_to_string(account.join("token"))
            .context("failed to read service account token")?;
        let ca = std::fs::read(account.join("ca.crt"))
            .context("failed to read cluster CA certificate")?;
        let client = reqwest::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(&ca)?)
            .timeout(timeout)
            .build()?;

        let host = if host.contains(':') { format!("[{host}]") } else { host };
        Ok(Self::new(client, &format!("https://{host}:{port}"), Some(token.trim().to_string())))
    }
}

#[async_trait]
impl SecretStore for KubernetesSecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, SecretError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/secrets/{}",
            self.api_url,
            urlencoding::encode(namespace),
            urlencoding::encode(name)
        );
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(backend)?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(not_found(namespace, name)),
            status if !status.is_success() => {
                return Err(SecretError::Backend(format!("Kubernetes API returned {status}")));
            },
            _ => {},
        }

        let secret: SecretObject = response.json().await.map_err(backend)?;
        secret
            .data
            .into_iter()
            .map(|(key, value)| {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(value)
                    .map_err(|e| backend(format!("invalid value for key {key}: {e}")))?;
                Ok((key, String::from_utf8_lossy(&decoded).into_owned()))
            })
            .collect()
    }
}

/// Reads secrets mounted as directories: `<root>/<name>/<key>` holds one value.
///
/// The namespace is ignored; a mounted volume is already namespaced.
#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SecretStore for DirectorySecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, SecretError> {
        let dir = self.root.join(name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(namespace, name))
            },
            Err(e) => return Err(backend(e)),
        };

        let mut data = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(backend)? {
            let key = entry.file_name().to_string_lossy().into_owned();
            // Kubernetes volume mounts carry `..data` style bookkeeping entries
            if key.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            let value = tokio::fs::read_to_string(entry.path()).await.map_err(backend)?;
            data.insert(key, value);
        }
        Ok(data)
    }
}

fn backend(e: impl std::fmt::Display) -> SecretError {
    SecretError::Backend(e.to_string())
}

fn not_found(namespace: &str, name: &str) -> SecretError {
    SecretError::NotFound { namespace: namespace.to_string(), name: name.to_string() }
}
