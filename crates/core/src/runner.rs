// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The run state machine: one trigger event in, one finished notification out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{self, ResolvedRun, WorkloadCatalog, CATALOG_PATH};
use crate::command::{self, DefaultRunParameters};
use crate::context::{RunContext, TriggerEvent};
use crate::environment::RunEnvironmentBuilder;
use crate::error::{NotificationError, RunError};
use crate::executor::ProcessRunner;
use crate::reporter::{
    EventReporter, EventSink, RunCorrelation, RunOutcome, StartedRun, SUCCESS_MESSAGE,
};
use crate::rewrite;
use crate::store::{ResourceFetcher, ResourceStore};

pub const SCRATCH_PREFIX: &str = "locust";
pub const SKIP_MESSAGE: &str = "Neither script nor conf is provided -> skipping tests";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Started,
    Resolving,
    Fetching,
    Executing,
    Finished,
}

impl RunPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Executing => "executing",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavior knobs of the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Program invoked for the load test.
    pub command: String,
    pub defaults: DefaultRunParameters,
    /// Also fetch the other `locust/` resources when a parameter file is used.
    pub fetch_siblings: bool,
    /// Send a `status.changed` notification once the workload is resolved.
    pub status_updates: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: "locust".to_string(),
            defaults: DefaultRunParameters::default(),
            fetch_siblings: true,
            status_updates: true,
        }
    }
}

/// Handles trigger events one at a time.
#[derive(Clone)]
pub struct TestRunner {
    store: Arc<dyn ResourceStore>,
    sink: Arc<dyn EventSink>,
    process: Arc<dyn ProcessRunner>,
    environment: RunEnvironmentBuilder,
    config: RunnerConfig,
}

/// Phase tracking for a single run.
struct Run {
    phase: RunPhase,
}

impl Run {
    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "Run phase changed");
        self.phase = phase;
    }
}

impl TestRunner {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        sink: Arc<dyn EventSink>,
        process: Arc<dyn ProcessRunner>,
        environment: RunEnvironmentBuilder,
        config: RunnerConfig,
    ) -> Self {
        Self { store, sink, process, environment, config }
    }

    /// Runs the load test requested by `event` and reports its lifecycle.
    ///
    /// Every fatal condition after a successful start is reported through the
    /// finished notification and shows up in the returned outcome.
    ///
    /// # Errors
    ///
    /// Returns a [`NotificationError`] if the started notification could not be
    /// sent (nothing else runs), or if the finished notification could not be
    /// delivered.
    #[tracing::instrument(
        skip_all,
        fields(
            project = %event.scope.project,
            stage = %event.scope.stage,
            service = %event.scope.service,
            strategy = %event.test_strategy,
        )
    )]
    pub async fn handle(&self, event: TriggerEvent) -> Result<RunOutcome, NotificationError> {
        tracing::info!(event_id = %event.id, "Handling test.triggered event");
        let mut run = Run { phase: RunPhase::Idle };

        let reporter = EventReporter::new(Arc::clone(&self.sink), RunCorrelation::from(&event));
        let mut started = match reporter.start().await {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send started event, aborting");
                return Err(e);
            },
        };
        run.enter(RunPhase::Started);

        let result = self.execute(&event, &mut run, &mut started).await;
        if let Err(e) = &result {
            tracing::warn!(phase = %run.phase, error = %e, "Run aborted");
        }
        run.enter(RunPhase::Finished);
        started.finish(result).await
    }

    async fn execute(
        &self,
        event: &TriggerEvent,
        run: &mut Run,
        started: &mut StartedRun,
    ) -> Result<String, RunError> {
        run.enter(RunPhase::Resolving);
        let target_url = event.target_url()?;

        // Removed on drop, whichever way this function returns.
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(RunError::ScratchDir)?;
        let context = RunContext {
            scope: event.scope.clone(),
            test_strategy: event.test_strategy.clone(),
            target_url,
            scratch_dir: scratch.path().to_path_buf(),
        };
        tracing::debug!(scratch = %context.scratch_dir().display(), "Created scratch directory");

        let fetcher = ResourceFetcher::new(Arc::clone(&self.store), context.scope.clone());
        let catalog = load_catalog(&fetcher).await?;
        let resolved = catalog::resolve(catalog.as_ref(), &context.test_strategy);

        let summary = format!(
            "TestStrategy={} -> testFile={}, serviceUrl={}",
            context.test_strategy,
            resolved.script.as_deref().unwrap_or_default(),
            context.target_url
        );
        tracing::info!("{summary}");
        if self.config.status_updates {
            started.status_changed(summary).await;
        }

        run.enter(RunPhase::Fetching);
        let (script, conf) =
            self.materialize(&fetcher, &resolved, context.scratch_dir()).await?;
        let env = self.environment.build(&context.scope).await;

        run.enter(RunPhase::Executing);
        let Some(args) = command::assemble(
            script.as_deref(),
            conf.as_deref(),
            &context.target_url,
            &self.config.defaults,
        ) else {
            tracing::info!("{SKIP_MESSAGE}");
            return Ok(SKIP_MESSAGE.to_string());
        };

        let output = self.process.execute(&self.config.command, &args, &env).await?;
        tracing::info!(output = %output, "Finished running locust tests");
        Ok(SUCCESS_MESSAGE.to_string())
    }

    /// Fetches the selected script and parameter file into the scratch directory.
    async fn materialize(
        &self,
        fetcher: &ResourceFetcher,
        resolved: &ResolvedRun,
        scratch_dir: &Path,
    ) -> Result<(Option<PathBuf>, Option<PathBuf>), RunError> {
        let script = match &resolved.script {
            Some(path) => Some(fetch_artifact(fetcher, "script", path, scratch_dir).await?),
            None => None,
        };

        let Some(conf_path) = &resolved.conf else {
            return Ok((script, None));
        };
        let conf = fetch_artifact(fetcher, "conf", conf_path, scratch_dir).await?;
        rewrite::rewrite(&conf, scratch_dir)
            .await
            .map_err(|source| RunError::Rewrite { path: conf.clone(), source })?;

        if self.config.fetch_siblings {
            // Resources land flat in the scratch directory, so a sibling sharing
            // a file name with the script or conf would overwrite it.
            let taken: Vec<&str> = [script.as_deref(), Some(conf.as_path())]
                .into_iter()
                .flatten()
                .filter_map(|p| p.file_name().and_then(|name| name.to_str()))
                .collect();
            fetcher
                .fetch_all(scratch_dir, |path| {
                    if path == CATALOG_PATH {
                        return false;
                    }
                    let name = path.rsplit('/').next().unwrap_or(path);
                    if taken.contains(&name) {
                        tracing::debug!(path = %path, "Skipping sibling shadowing an artifact");
                        return false;
                    }
                    true
                })
                .await
                .map_err(RunError::Siblings)?;
        }

        Ok((script, Some(conf)))
    }
}

async fn load_catalog(fetcher: &ResourceFetcher) -> Result<Option<WorkloadCatalog>, RunError> {
    match fetcher.read(CATALOG_PATH).await {
        Ok(content) => {
            let catalog = WorkloadCatalog::parse(&String::from_utf8_lossy(&content))?;
            match &catalog {
                Some(c) => tracing::info!(workloads = c.workloads.len(), "Loaded {CATALOG_PATH}"),
                None => tracing::info!("Empty {CATALOG_PATH}, continuing with default settings"),
            }
            Ok(catalog)
        },
        Err(e) if e.is_not_found() => {
            tracing::info!("No {CATALOG_PATH} provided, continuing with default settings");
            Ok(None)
        },
        Err(e) => Err(RunError::Catalog(e)),
    }
}

async fn fetch_artifact(
    fetcher: &ResourceFetcher,
    kind: &'static str,
    path: &str,
    scratch_dir: &Path,
) -> Result<PathBuf, RunError> {
    let local = fetcher
        .fetch(path, scratch_dir)
        .await
        .map_err(|source| RunError::Artifact { kind, path: path.to_string(), source })?;
    tracing::info!(kind, path = %path, "Fetched load test {kind}");
    Ok(local)
}
