// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Keptn `test` task payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Fields shared by every Keptn task event payload.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EventData {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub service: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,
    /// `succeeded` or `errored`, set on finished events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `pass` or `fail`, set on finished events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of `sh.keptn.event.test.triggered`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TestTriggeredData {
    #[serde(flatten)]
    pub event: EventData,
    #[serde(default)]
    pub test: TestTriggeredDetails,
    #[serde(default)]
    pub deployment: DeploymentDetails,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TestTriggeredDetails {
    #[serde(default, rename = "teststrategy")]
    pub test_strategy: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetails {
    #[serde(default, rename = "deploymentURIsLocal")]
    pub deployment_uris_local: Vec<String>,
    #[serde(default, rename = "deploymentURIsPublic")]
    pub deployment_uris_public: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_names: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_commit: String,
}

/// Payload of `sh.keptn.event.test.finished`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFinishedData {
    #[serde(flatten)]
    pub event: EventData,
    pub test: TestFinishedDetails,
}

/// RFC 3339 timestamps bracketing the load test.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFinishedDetails {
    pub start: String,
    pub end: String,
}

/// Data of any outbound notification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NotificationData {
    Finished(TestFinishedData),
    Event(EventData),
}
