// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Trigger events and the per-run context derived from them.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use url::Url;

use crate::error::RunError;

/// The project/stage/service triple addressing resources and secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunScope {
    pub project: String,
    pub stage: String,
    pub service: String,
}

impl std::fmt::Display for RunScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.stage, self.service)
    }
}

/// An inbound "test requested for a service" event, decoupled from its wire format.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// Identifier of the triggering event, echoed back as `triggeredid`.
    pub id: String,
    /// Keptn context shared by every event of the same sequence.
    pub keptn_context: String,
    pub scope: RunScope,
    pub labels: IndexMap<String, String>,
    pub test_strategy: String,
    pub deployment_uris_public: Vec<String>,
    pub deployment_uris_local: Vec<String>,
}

impl TriggerEvent {
    /// Selects the URL the load test runs against.
    ///
    /// The first non-empty public URI wins, then the first non-empty local one.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::NoDeploymentUri`] if neither list has a non-empty
    /// entry, or [`RunError::InvalidDeploymentUri`] if the selected entry is not
    /// a valid URL.
    pub fn target_url(&self) -> Result<String, RunError> {
        let uri = first_non_empty(&self.deployment_uris_public)
            .or_else(|| first_non_empty(&self.deployment_uris_local))
            .ok_or(RunError::NoDeploymentUri)?;
        // Validated only; the URI is handed to the load test exactly as received.
        Url::parse(uri).map_err(|e| RunError::InvalidDeploymentUri {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;
        Ok(uri.to_string())
    }
}

fn first_non_empty(uris: &[String]) -> Option<&str> {
    uris.iter().map(String::as_str).find(|uri| !uri.is_empty())
}

/// Immutable bundle describing one run.
///
/// `scratch_dir` is a copy of the path of a directory owned by the run; it
/// is removed when the run ends.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub scope: RunScope,
    pub test_strategy: String,
    pub target_url: String,
    pub scratch_dir: PathBuf,
}

impl RunContext {
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}
