// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-service environment for the load-test process, sourced from secrets.
//!
//! A secret named `locust-<project>-<stage>-<service>` may hold any number of
//! key/value pairs; each one is exported to the load test as `KEY=VALUE`.
//! The lookup is best effort: a missing secret or an unreachable backend
//! simply means no extra environment.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::RunScope;

pub const SECRET_PREFIX: &str = "locust";
pub const NAMESPACE_ENV: &str = "POD_NAMESPACE";
pub const DEFAULT_NAMESPACE: &str = "keptn";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("secret backend error: {0}")]
    Backend(String),
}

/// A namespaced key/value secret backend.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, SecretError>;
}

/// Where the secret namespace comes from.
#[derive(Debug, Clone)]
pub enum NamespaceSource {
    Fixed(String),
    /// Read from an environment variable on every lookup, with a fallback.
    Env { var: String, default: String },
}

impl NamespaceSource {
    pub fn resolve(&self) -> String {
        match self {
            Self::Fixed(namespace) => namespace.clone(),
            Self::Env { var, default } => std::env::var(var)
                .ok()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| default.clone()),
        }
    }
}

impl Default for NamespaceSource {
    fn default() -> Self {
        Self::Env { var: NAMESPACE_ENV.to_string(), default: DEFAULT_NAMESPACE.to_string() }
    }
}

pub fn secret_name(scope: &RunScope) -> String {
    format!("{SECRET_PREFIX}-{}-{}-{}", scope.project, scope.stage, scope.service)
}

#[derive(Clone)]
pub struct RunEnvironmentBuilder {
    store: Option<Arc<dyn SecretStore>>,
    namespace: NamespaceSource,
}

impl RunEnvironmentBuilder {
    pub fn new(store: Arc<dyn SecretStore>, namespace: NamespaceSource) -> Self {
        Self { store: Some(store), namespace }
    }

    /// A builder that never adds anything to the environment.
    pub fn disabled() -> Self {
        Self { store: None, namespace: NamespaceSource::default() }
    }

    /// Returns `KEY=VALUE` entries for the scope's secret, ordered by key.
    ///
    /// Never fails: lookup errors are logged and yield an empty environment.
    pub async fn build(&self, scope: &RunScope) -> Vec<String> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        let namespace = self.namespace.resolve();
        let name = secret_name(scope);
        tracing::debug!(%namespace, secret = %name, "Preparing environment from secret");

        match store.get(&namespace, &name).await {
            Ok(data) => data.into_iter().map(|(key, value)| format!("{key}={value}")).collect(),
            Err(SecretError::NotFound { .. }) => {
                tracing::debug!(
                    %namespace,
                    secret = %name,
                    "No secret for service, using plain environment"
                );
                Vec::new()
            },
            Err(e) => {
                tracing::info!(%namespace, secret = %name, error = %e, "Unable to get secret");
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{scope, MemorySecretStore};

    fn builder(store: MemorySecretStore) -> RunEnvironmentBuilder {
        RunEnvironmentBuilder::new(Arc::new(store), NamespaceSource::Fixed("keptn".to_string()))
    }

    #[test]
    fn test_secret_name() {
        assert_eq!(secret_name(&scope()), "locust-sockshop-staging-carts");
    }

    #[tokio::test]
    async fn test_build_exports_every_pair() {
        let store = MemorySecretStore::default().with_secret(
            "keptn",
            "locust-sockshop-staging-carts",
            &[("key2", "value2"), ("key1", "value1")],
        );
        let env = builder(store).build(&scope()).await;
        assert_eq!(env, vec!["key1=value1".to_string(), "key2=value2".to_string()]);
    }

    #[tokio::test]
    async fn test_build_keeps_complex_values_verbatim() {
        let store = MemorySecretStore::default().with_secret(
            "keptn",
            "locust-sockshop-staging-carts",
            &[("key1", "complex value=1"), ("key2", "\"value2\"")],
        );
        let env = builder(store).build(&scope()).await;
        assert_eq!(env, vec!["key1=complex value=1".to_string(), "key2=\"value2\"".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_secret_yields_empty_environment() {
        let store = MemorySecretStore::default().with_secret(
            "keptn",
            "locust-sockshop-staging-unknown",
            &[("key1", "value1")],
        );
        assert!(builder(store).build(&scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_swallowed() {
        let store = MemorySecretStore::failing();
        assert!(builder(store).build(&scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_secret_in_other_namespace_is_invisible() {
        let store = MemorySecretStore::default().with_secret(
            "other",
            "locust-sockshop-staging-carts",
            &[("key1", "value1")],
        );
        assert!(builder(store).build(&scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_builder() {
        assert!(RunEnvironmentBuilder::disabled().build(&scope()).await.is_empty());
    }

    #[test]
    fn test_env_namespace_falls_back_to_default() {
        let source = NamespaceSource::Env {
            var: "LOCUST_SERVICE_TEST_UNSET_NAMESPACE".to_string(),
            default: "keptn".to_string(),
        };
        assert_eq!(source.resolve(), "keptn");
    }
}
