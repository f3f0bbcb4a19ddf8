// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Sequential run queue and assembly of the runner from configuration.

use std::sync::Arc;
use std::time::Duration;

use locust_service_core::{
    NamespaceSource, ResourceStore, RunEnvironmentBuilder, SecretStore, SubprocessRunner,
    TestRunner, TriggerEvent,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{Config, SecretBackend};
use crate::events::HttpEventSink;
use crate::resources::{ConfigurationServiceStore, LocalDirectoryStore};
use crate::secrets::{DirectorySecretStore, KubernetesSecretStore};

/// Why a trigger event could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
    Closed,
}

/// Producer side of the run queue.
#[derive(Clone)]
pub struct RunQueue {
    tx: mpsc::Sender<TriggerEvent>,
}

impl RunQueue {
    /// Queues `event` without waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::Full`] when the queue is at capacity and
    /// [`EnqueueError::Closed`] when the worker has stopped.
    pub fn enqueue(&self, event: TriggerEvent) -> Result<(), EnqueueError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

/// Spawns the single worker that handles queued events one after another.
///
/// The worker exits once every [`RunQueue`] clone is dropped and the queue is
/// drained, so awaiting the handle lets an in-flight run finish.
pub fn spawn_worker(runner: TestRunner, capacity: usize) -> (RunQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<TriggerEvent>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let id = event.id.clone();
            match runner.handle(event).await {
                Ok(outcome) => info!(
                    event_id = %id,
                    status = outcome.status.as_str(),
                    result = outcome.result.as_str(),
                    "Run completed"
                ),
                Err(e) => error!(event_id = %id, error = %e, "Run could not be reported"),
            }
        }
        info!("Run queue closed, worker stopping");
    });

    (RunQueue { tx }, handle)
}

/// Builds the runner with the adapters selected by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_runner(config: &Config) -> anyhow::Result<TestRunner> {
    let timeout = Duration::from_secs(config.keptn.request_timeout_secs);
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let store: Arc<dyn ResourceStore> = match &config.resources.local_dir {
        Some(dir) => {
            info!(dir = %dir, "Reading resources from local directory");
            Arc::new(LocalDirectoryStore::new(dir))
        },
        None => Arc::new(ConfigurationServiceStore::new(
            client.clone(),
            &config.keptn.configuration_service_url,
        )),
    };

    let sink =
        Arc::new(HttpEventSink::new(client, &config.keptn.event_broker_url, &config.service.name));

    Ok(TestRunner::new(
        store,
        sink,
        Arc::new(SubprocessRunner),
        build_environment(config, timeout),
        config.runner_config(),
    ))
}

fn build_environment(config: &Config, timeout: Duration) -> RunEnvironmentBuilder {
    let secrets = &config.secrets;
    let namespace = NamespaceSource::Env {
        var: secrets.namespace_env.clone(),
        default: secrets.default_namespace.clone(),
    };

    let store: Arc<dyn SecretStore> = match secrets.backend {
        SecretBackend::Disabled => return RunEnvironmentBuilder::disabled(),
        SecretBackend::Directory => {
            let Some(dir) = &secrets.directory else {
                warn!("Directory secret backend has no secrets.directory, secrets disabled");
                return RunEnvironmentBuilder::disabled();
            };
            Arc::new(DirectorySecretStore::new(dir))
        },
        SecretBackend::Kubernetes => match KubernetesSecretStore::in_cluster(timeout) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Kubernetes secrets unavailable, secrets disabled");
                return RunEnvironmentBuilder::disabled();
            },
        },
    };
    RunEnvironmentBuilder::new(store, namespace)
}
