// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Lifecycle notifications for a run.
//!
//! A run reports `started` once, at most one `status.changed`, and exactly one
//! `finished`. The exactly-once guarantee is carried by the types:
//! [`EventReporter::start`] yields a [`StartedRun`], and [`StartedRun::finish`]
//! consumes it.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::context::{RunScope, TriggerEvent};
use crate::error::{NotificationError, RunError};

pub const SUCCESS_MESSAGE: &str = "Locust test finished successfully";

/// Fields copied from the trigger onto every outbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCorrelation {
    pub keptn_context: String,
    pub triggered_id: String,
    pub scope: RunScope,
    pub labels: IndexMap<String, String>,
}

impl From<&TriggerEvent> for RunCorrelation {
    fn from(event: &TriggerEvent) -> Self {
        Self {
            keptn_context: event.keptn_context.clone(),
            triggered_id: event.id.clone(),
            scope: event.scope.clone(),
            labels: event.labels.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Errored,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Errored => "errored",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Pass,
    Fail,
}

impl TestResult {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Final result of a run as reported in the finished notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub result: TestResult,
    pub message: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl RunOutcome {
    pub fn new(
        result: &Result<String, RunError>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Self {
        match result {
            Ok(message) => Self {
                status: RunStatus::Succeeded,
                result: TestResult::Pass,
                message: message.clone(),
                start,
                end,
            },
            Err(e) => Self {
                status: RunStatus::Errored,
                result: TestResult::Fail,
                message: e.to_string(),
                start,
                end,
            },
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Started,
    StatusChanged { message: String },
    Finished(RunOutcome),
}

impl Notification {
    /// Short event name, e.g. `status.changed`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::StatusChanged { .. } => "status.changed",
            Self::Finished(_) => "finished",
        }
    }
}

/// Delivers notifications to the orchestration bus.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(
        &self,
        correlation: &RunCorrelation,
        notification: Notification,
    ) -> Result<(), NotificationError>;
}

pub struct EventReporter {
    sink: Arc<dyn EventSink>,
    correlation: RunCorrelation,
}

impl EventReporter {
    pub fn new(sink: Arc<dyn EventSink>, correlation: RunCorrelation) -> Self {
        Self { sink, correlation }
    }

    /// Emits `started` and opens the run.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`NotificationError`]; the run must then be abandoned
    /// without a finished notification.
    pub async fn start(self) -> Result<StartedRun, NotificationError> {
        let start = OffsetDateTime::now_utc();
        self.sink.send(&self.correlation, Notification::Started).await?;
        Ok(StartedRun { sink: self.sink, correlation: self.correlation, start, status_sent: false })
    }
}

/// A run whose `started` notification was delivered.
pub struct StartedRun {
    sink: Arc<dyn EventSink>,
    correlation: RunCorrelation,
    start: OffsetDateTime,
    status_sent: bool,
}

impl StartedRun {
    /// Emits `status.changed`. Only the first call per run sends anything, and
    /// delivery failures are only logged.
    pub async fn status_changed(&mut self, message: String) {
        if self.status_sent {
            tracing::debug!(message = %message, "Status update already sent, dropping");
            return;
        }
        self.status_sent = true;
        let notification = Notification::StatusChanged { message };
        if let Err(e) = self.sink.send(&self.correlation, notification).await {
            tracing::warn!(error = %e, "Failed to send status update");
        }
    }

    /// Emits `finished` for `result` and closes the run.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`NotificationError`] if the finished notification
    /// could not be delivered.
    pub async fn finish(
        self,
        result: Result<String, RunError>,
    ) -> Result<RunOutcome, NotificationError> {
        let outcome = RunOutcome::new(&result, self.start, OffsetDateTime::now_utc());
        match &result {
            Ok(message) => {
                tracing::info!(scope = %self.correlation.scope, %message, "Run succeeded");
            },
            Err(e) => tracing::warn!(scope = %self.correlation.scope, error = %e, "Run failed"),
        }

        let notification = Notification::Finished(outcome.clone());
        self.sink.send(&self.correlation, notification).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to send finished event");
            e
        })?;
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{correlation, RecordingSink};

    #[tokio::test]
    async fn test_success_lifecycle() {
        let sink = Arc::new(RecordingSink::default());
        let mut run = EventReporter::new(sink.clone(), correlation()).start().await.unwrap();
        run.status_changed("first".to_string()).await;
        run.status_changed("second".to_string()).await;
        let outcome = run.finish(Ok(SUCCESS_MESSAGE.to_string())).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.result, TestResult::Pass);
        assert!(outcome.start <= outcome.end);
        assert_eq!(sink.kinds(), vec!["started", "status.changed", "finished"]);
        assert_eq!(sink.status_messages(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_outcome_carries_error_text() {
        let sink = Arc::new(RecordingSink::default());
        let run = EventReporter::new(sink.clone(), correlation()).start().await.unwrap();
        let outcome = run.finish(Err(RunError::NoDeploymentUri)).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Errored);
        assert_eq!(outcome.result, TestResult::Fail);
        assert_eq!(outcome.message, "no deployment URI included in event");
        assert_eq!(sink.finished().len(), 1);
    }

    #[tokio::test]
    async fn test_started_failure_is_returned() {
        let sink = Arc::new(RecordingSink::failing_on("started"));
        let err = EventReporter::new(sink.clone(), correlation()).start().await.err().unwrap();
        assert_eq!(err.event, "started");
        assert!(sink.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_status_failure_is_not_fatal() {
        let sink = Arc::new(RecordingSink::failing_on("status.changed"));
        let mut run = EventReporter::new(sink.clone(), correlation()).start().await.unwrap();
        run.status_changed("ignored".to_string()).await;
        assert!(run.finish(Ok("done".to_string())).await.is_ok());
        assert_eq!(sink.kinds(), vec!["started", "finished"]);
    }

    #[tokio::test]
    async fn test_finished_failure_is_returned() {
        let sink = Arc::new(RecordingSink::failing_on("finished"));
        let run = EventReporter::new(sink.clone(), correlation()).start().await.unwrap();
        let err = run.finish(Ok("done".to_string())).await.unwrap_err();
        assert_eq!(err.event, "finished");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(RunStatus::Succeeded.as_str(), "succeeded");
        assert_eq!(RunStatus::Errored.as_str(), "errored");
        assert_eq!(TestResult::Pass.as_str(), "pass");
        assert_eq!(TestResult::Fail.as_str(), "fail");
    }
}
