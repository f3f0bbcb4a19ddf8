// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! In-memory fakes of the collaborator traits, shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;

use crate::context::{RunScope, TriggerEvent};
use crate::environment::{SecretError, SecretStore};
use crate::error::{ExecutionError, FetchError, NotificationError};
use crate::executor::ProcessRunner;
use crate::reporter::{EventSink, Notification, RunCorrelation, RunOutcome};

pub fn scope() -> RunScope {
    RunScope {
        project: "sockshop".to_string(),
        stage: "staging".to_string(),
        service: "carts".to_string(),
    }
}

pub fn correlation() -> RunCorrelation {
    RunCorrelation {
        keptn_context: "ctx-1".to_string(),
        triggered_id: "evt-1".to_string(),
        scope: scope(),
        labels: IndexMap::new(),
    }
}

pub fn trigger(strategy: &str) -> TriggerEvent {
    TriggerEvent {
        id: "evt-1".to_string(),
        keptn_context: "ctx-1".to_string(),
        scope: scope(),
        labels: IndexMap::from([("build".to_string(), "42".to_string())]),
        test_strategy: strategy.to_string(),
        deployment_uris_public: vec!["http://carts.staging".to_string()],
        deployment_uris_local: Vec::new(),
    }
}

/// Resource store keyed by logical path; entries keep insertion order.
#[derive(Default)]
pub struct MemoryResourceStore {
    resources: IndexMap<String, Option<Bytes>>,
}

impl MemoryResourceStore {
    pub fn with(mut self, path: &str, content: &str) -> Self {
        self.resources.insert(path.to_string(), Some(Bytes::from(content.to_string())));
        self
    }

    pub fn with_bytes(mut self, path: &str, content: &'static [u8]) -> Self {
        self.resources.insert(path.to_string(), Some(Bytes::from_static(content)));
        self
    }

    /// Lists `path`, but fails every read of it with a store error.
    pub fn with_failure(mut self, path: &str) -> Self {
        self.resources.insert(path.to_string(), None);
        self
    }
}

#[async_trait]
impl crate::store::ResourceStore for MemoryResourceStore {
    async fn get(&self, _scope: &RunScope, path: &str) -> Result<Bytes, FetchError> {
        match self.resources.get(path) {
            Some(Some(content)) => Ok(content.clone()),
            Some(None) => Err(FetchError::store(path, "injected failure")),
            None => Err(FetchError::NotFound { path: path.to_string() }),
        }
    }

    async fn list(&self, _scope: &RunScope) -> Result<Vec<String>, FetchError> {
        Ok(self.resources.keys().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: BTreeMap<(String, String), BTreeMap<String, String>>,
    failing: bool,
}

impl MemorySecretStore {
    pub fn with_secret(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let data = data.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        self.secrets.insert((namespace.to_string(), name.to_string()), data);
        self
    }

    pub fn failing() -> Self {
        Self { secrets: BTreeMap::new(), failing: true }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>, SecretError> {
        if self.failing {
            return Err(SecretError::Backend("injected failure".to_string()));
        }
        self.secrets.get(&(namespace.to_string(), name.to_string())).cloned().ok_or_else(|| {
            SecretError::NotFound { namespace: namespace.to_string(), name: name.to_string() }
        })
    }
}

/// Records delivered notifications; can refuse one kind of notification.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(RunCorrelation, Notification)>>,
    fail_on: Option<&'static str>,
}

impl RecordingSink {
    pub fn failing_on(kind: &'static str) -> Self {
        Self { sent: Mutex::new(Vec::new()), fail_on: Some(kind) }
    }

    pub fn sent(&self) -> Vec<(RunCorrelation, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|(_, n)| n.kind()).collect()
    }

    pub fn status_messages(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(_, n)| match n {
                Notification::StatusChanged { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<RunOutcome> {
        self.sent()
            .into_iter()
            .filter_map(|(_, n)| match n {
                Notification::Finished(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(
        &self,
        correlation: &RunCorrelation,
        notification: Notification,
    ) -> Result<(), NotificationError> {
        if self.fail_on == Some(notification.kind()) {
            return Err(NotificationError {
                event: notification.kind(),
                message: "injected failure".to_string(),
            });
        }
        self.sent.lock().unwrap().push((correlation.clone(), notification));
        Ok(())
    }
}

/// What a [`ScriptedRunner`] observed when it was invoked.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    /// Directory holding the script or parameter file, if one was passed.
    pub scratch_dir: Option<PathBuf>,
    /// Sorted file names found in `scratch_dir` at execution time.
    pub scratch_files: Vec<String>,
    /// Content of the parameter file at execution time.
    pub conf_content: Option<String>,
}

/// Process runner returning a canned result and recording each call.
pub struct ScriptedRunner {
    calls: Mutex<Vec<RecordedCall>>,
    failure: Option<(String, String)>,
    output: String,
}

impl ScriptedRunner {
    pub fn succeeding(output: &str) -> Self {
        Self { calls: Mutex::new(Vec::new()), failure: None, output: output.to_string() }
    }

    pub fn failing(status: &str, output: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some((status.to_string(), output.to_string())),
            output: String::new(),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn arg_path(args: &[String], prefix: &str) -> Option<PathBuf> {
    args.iter().find_map(|a| a.strip_prefix(prefix)).map(PathBuf::from)
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        env: &[String],
    ) -> Result<String, ExecutionError> {
        let conf = arg_path(args, "--config=");
        let scratch_dir = arg_path(args, "-f=")
            .or_else(|| conf.clone())
            .and_then(|p| p.parent().map(PathBuf::from));

        let mut scratch_files: Vec<String> = scratch_dir
            .as_ref()
            .map(|dir| {
                std::fs::read_dir(dir)
                    .unwrap()
                    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        scratch_files.sort();

        self.calls.lock().unwrap().push(RecordedCall {
            program: program.to_string(),
            args: args.to_vec(),
            env: env.to_vec(),
            scratch_dir,
            scratch_files,
            conf_content: conf.map(|path| std::fs::read_to_string(path).unwrap()),
        });

        match &self.failure {
            Some((status, output)) => Err(ExecutionError::Failed {
                command: program.to_string(),
                args: args.to_vec(),
                status: status.clone(),
                output: output.clone(),
            }),
            None => Ok(self.output.clone()),
        }
    }
}
