// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! api: Defines the event contract between the locust service and Keptn.
//!
//! All events are structured CloudEvents (JSON) carrying Keptn task payloads.
//! This crate converts between that wire format and the core run types:
//! inbound `test.triggered` events become [`TriggerEvent`]s, and core
//! [`Notification`]s become outbound `test.*` events.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub mod keptn;

pub use keptn::{
    DeploymentDetails, EventData, NotificationData, TestFinishedData, TestFinishedDetails,
    TestTriggeredData, TestTriggeredDetails,
};
use locust_service_core::{Notification, RunCorrelation, RunScope, TriggerEvent};

pub const CLOUDEVENTS_SPEC_VERSION: &str = "1.0";
pub const KEPTN_SPEC_VERSION: &str = "0.2.3";
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type of a structured-mode CloudEvent request body.
pub const CLOUDEVENTS_CONTENT_TYPE: &str = "application/cloudevents+json";

pub const TEST_TRIGGERED: &str = "sh.keptn.event.test.triggered";
pub const TEST_STARTED: &str = "sh.keptn.event.test.started";
pub const TEST_STATUS_CHANGED: &str = "sh.keptn.event.test.status.changed";
pub const TEST_FINISHED: &str = "sh.keptn.event.test.finished";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unexpected event type {actual}, expected {expected}")]
    UnexpectedType { expected: &'static str, actual: String },

    #[error("invalid event data: {0}")]
    InvalidData(#[from] serde_json::Error),

    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// A structured-mode CloudEvent with the Keptn extension attributes.
///
/// # Example
/// ```json
/// {
///   "specversion": "1.0",
///   "id": "f2b878d3-03c0-4e8f-bc3f-454bc1b3d79d",
///   "source": "shipyard-controller",
///   "type": "sh.keptn.event.test.triggered",
///   "datacontenttype": "application/json",
///   "shkeptncontext": "a3e5f16d-8888-4720-82c7-6995062905c1",
///   "data": { "project": "sockshop", "stage": "staging", "service": "carts" }
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CloudEvent<T = serde_json::Value> {
    #[serde(default = "default_spec_version")]
    pub specversion: String,
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Keptn context, shared by all events of one sequence.
    #[serde(default)]
    pub shkeptncontext: String,
    /// Id of the `.triggered` event a task event answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggeredid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shkeptnspecversion: Option<String>,
    pub data: T,
}

fn default_spec_version() -> String {
    CLOUDEVENTS_SPEC_VERSION.to_string()
}

impl CloudEvent {
    /// Converts an inbound `test.triggered` event into a core trigger.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::UnexpectedType`] for any other event type, or
    /// [`ApiError::InvalidData`] if the payload is not a test trigger.
    pub fn into_trigger(self) -> Result<TriggerEvent, ApiError> {
        if self.event_type != TEST_TRIGGERED {
            return Err(ApiError::UnexpectedType {
                expected: TEST_TRIGGERED,
                actual: self.event_type,
            });
        }
        let data: TestTriggeredData = serde_json::from_value(self.data)?;
        Ok(TriggerEvent {
            id: self.id,
            keptn_context: self.shkeptncontext,
            scope: RunScope {
                project: data.event.project,
                stage: data.event.stage,
                service: data.event.service,
            },
            labels: data.event.labels,
            test_strategy: data.test.test_strategy,
            deployment_uris_public: data.deployment.deployment_uris_public,
            deployment_uris_local: data.deployment.deployment_uris_local,
        })
    }
}

/// Full event type of a core notification.
pub const fn event_type(notification: &Notification) -> &'static str {
    match notification {
        Notification::Started => TEST_STARTED,
        Notification::StatusChanged { .. } => TEST_STATUS_CHANGED,
        Notification::Finished(_) => TEST_FINISHED,
    }
}

fn rfc3339(at: OffsetDateTime) -> Result<String, ApiError> {
    Ok(at.format(&Rfc3339)?)
}

/// Builds the outbound CloudEvent for `notification`.
///
/// # Errors
///
/// Returns [`ApiError::Timestamp`] if a timestamp cannot be rendered as RFC 3339.
pub fn notification_event(
    id: String,
    source: &str,
    at: OffsetDateTime,
    correlation: &RunCorrelation,
    notification: &Notification,
) -> Result<CloudEvent<NotificationData>, ApiError> {
    let mut event = EventData {
        project: correlation.scope.project.clone(),
        stage: correlation.scope.stage.clone(),
        service: correlation.scope.service.clone(),
        labels: correlation.labels.clone(),
        ..EventData::default()
    };

    let data = match notification {
        Notification::Started => NotificationData::Event(event),
        Notification::StatusChanged { message } => {
            event.message = Some(message.clone());
            NotificationData::Event(event)
        },
        Notification::Finished(outcome) => {
            event.status = Some(outcome.status.as_str().to_string());
            event.result = Some(outcome.result.as_str().to_string());
            event.message = Some(outcome.message.clone());
            NotificationData::Finished(TestFinishedData {
                event,
                test: TestFinishedDetails {
                    start: rfc3339(outcome.start)?,
                    end: rfc3339(outcome.end)?,
                },
            })
        },
    };

    Ok(CloudEvent {
        specversion: CLOUDEVENTS_SPEC_VERSION.to_string(),
        id,
        source: source.to_string(),
        event_type: event_type(notification).to_string(),
        datacontenttype: Some(JSON_CONTENT_TYPE.to_string()),
        time: Some(rfc3339(at)?),
        shkeptncontext: correlation.keptn_context.clone(),
        triggeredid: Some(correlation.triggered_id.clone()),
        shkeptnspecversion: Some(KEPTN_SPEC_VERSION.to_string()),
        data,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use locust_service_core::{RunOutcome, RunStatus, TestResult};
    use serde_json::json;

    fn triggered() -> serde_json::Value {
        json!({
            "specversion": "1.0",
            "id": "evt-1",
            "source": "shipyard-controller",
            "type": "sh.keptn.event.test.triggered",
            "datacontenttype": "application/json",
            "shkeptncontext": "ctx-1",
            "data": {
                "project": "sockshop",
                "stage": "staging",
                "service": "carts",
                "test": {"teststrategy": "performance"},
                "deployment": {
                    "deploymentURIsPublic": ["http://carts.example.com"],
                    "deploymentURIsLocal": ["http://carts.sockshop-staging"]
                }
            }
        })
    }

    fn correlation() -> RunCorrelation {
        RunCorrelation {
            keptn_context: "ctx-1".to_string(),
            triggered_id: "evt-1".to_string(),
            scope: RunScope {
                project: "sockshop".to_string(),
                stage: "staging".to_string(),
                service: "carts".to_string(),
            },
            labels: IndexMap::from([("build".to_string(), "42".to_string())]),
        }
    }

    #[test]
    fn test_into_trigger() {
        let event: CloudEvent = serde_json::from_value(triggered()).unwrap();
        let trigger = event.into_trigger().unwrap();

        assert_eq!(trigger.id, "evt-1");
        assert_eq!(trigger.keptn_context, "ctx-1");
        assert_eq!(trigger.scope.to_string(), "sockshop.staging.carts");
        assert_eq!(trigger.test_strategy, "performance");
        assert_eq!(trigger.target_url().unwrap(), "http://carts.example.com");
    }

    #[test]
    fn test_into_trigger_rejects_other_types() {
        let mut value = triggered();
        value["type"] = json!("sh.keptn.event.evaluation.triggered");
        let event: CloudEvent = serde_json::from_value(value).unwrap();

        let err = event.into_trigger().unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedType { .. }));
    }

    #[test]
    fn test_into_trigger_rejects_malformed_data() {
        let mut value = triggered();
        value["data"] = json!({"project": 5});
        let event: CloudEvent = serde_json::from_value(value).unwrap();

        assert!(matches!(event.into_trigger(), Err(ApiError::InvalidData(_))));
    }

    #[test]
    fn test_started_event() {
        let at = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let notification = Notification::Started;
        let event = notification_event(
            "id-1".to_string(),
            "locust-service",
            at,
            &correlation(),
            &notification,
        )
        .unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "sh.keptn.event.test.started");
        assert_eq!(value["source"], "locust-service");
        assert_eq!(value["shkeptncontext"], "ctx-1");
        assert_eq!(value["triggeredid"], "evt-1");
        assert_eq!(value["time"], "1970-01-01T00:00:00Z");
        assert_eq!(
            value["data"],
            json!({
                "project": "sockshop",
                "stage": "staging",
                "service": "carts",
                "labels": {"build": "42"}
            })
        );
    }

    #[test]
    fn test_finished_event_carries_outcome_and_timestamps() {
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let end = OffsetDateTime::from_unix_timestamp(1_700_000_120).unwrap();
        let outcome = RunOutcome {
            status: RunStatus::Errored,
            result: TestResult::Fail,
            message: "boom".to_string(),
            start,
            end,
        };
        let notification = Notification::Finished(outcome);
        let event = notification_event(
            "id-2".to_string(),
            "locust-service",
            end,
            &correlation(),
            &notification,
        )
        .unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "sh.keptn.event.test.finished");
        assert_eq!(value["data"]["status"], "errored");
        assert_eq!(value["data"]["result"], "fail");
        assert_eq!(value["data"]["message"], "boom");
        assert_eq!(value["data"]["test"]["start"], "2023-11-14T22:13:20Z");
        assert_eq!(value["data"]["test"]["end"], "2023-11-14T22:15:20Z");
    }

    #[test]
    fn test_status_changed_event() {
        let at = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let message = "TestStrategy=performance";
        let notification = Notification::StatusChanged { message: message.to_string() };
        let event = notification_event(
            "id-3".to_string(),
            "locust-service",
            at,
            &correlation(),
            &notification,
        )
        .unwrap();

        assert_eq!(event.event_type, TEST_STATUS_CHANGED);
        assert!(matches!(
            event.data,
            NotificationData::Event(ref d) if d.message.as_deref() == Some(message)
        ));
    }
}
