// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Workload catalog parsing and strategy resolution.
//!
//! The catalog is an optional YAML document stored next to the service in the
//! configuration store:
//!
//! ```yaml
//! spec_version: '0.1.0'
//! workloads:
//!   - teststrategy: performance
//!     script: locust/load.py
//!     conf: locust/load.conf
//!   - teststrategy: functional
//!     script: locust/health.py
//! ```
//!
//! Resolution distinguishes three situations:
//!
//! - no catalog at all: the default script is used without a parameter file;
//! - a catalog without an entry for the strategy: nothing is run;
//! - one or more matching entries: their non-empty fields are merged in
//!   document order, later entries winning field by field.

use serde::Deserialize;

use crate::error::ParseError;

/// Logical path of the workload catalog in the configuration store.
pub const CATALOG_PATH: &str = "locust/locust.conf.yaml";

/// Script used when the service has no workload catalog.
pub const DEFAULT_SCRIPT_PATH: &str = "locustfile.py";

/// Logical prefix under which all load-test resources of a service live.
pub const RESOURCE_PREFIX: &str = "locust/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkloadCatalog {
    #[serde(default)]
    pub spec_version: String,
    #[serde(default)]
    pub workloads: Vec<WorkloadEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkloadEntry {
    #[serde(default, rename = "teststrategy")]
    pub test_strategy: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub conf: Option<String>,
}

/// The artifacts selected for one run, as logical paths in the store.
///
/// `None` means "not set"; both `None` is the explicit "no workload" state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRun {
    pub script: Option<String>,
    pub conf: Option<String>,
}

impl ResolvedRun {
    pub const fn is_empty(&self) -> bool {
        self.script.is_none() && self.conf.is_none()
    }
}

impl WorkloadCatalog {
    /// Parses catalog content fetched from the store.
    ///
    /// Returns `Ok(None)` for blank content, which the store uses to signal an
    /// empty resource; callers treat that exactly like a missing catalog.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the content is not a valid catalog document.
    pub fn parse(content: &str) -> Result<Option<Self>, ParseError> {
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_saphyr::from_str::<Self>(content)
            .map(Some)
            .map_err(|e| ParseError { path: CATALOG_PATH.to_string(), message: e.to_string() })
    }
}

/// Resolves which script and parameter file apply to `strategy`.
pub fn resolve(catalog: Option<&WorkloadCatalog>, strategy: &str) -> ResolvedRun {
    let Some(catalog) = catalog else {
        return ResolvedRun { script: Some(DEFAULT_SCRIPT_PATH.to_string()), conf: None };
    };

    let mut resolved = ResolvedRun::default();
    // No early exit: later entries for the same strategy override earlier ones.
    for entry in catalog.workloads.iter().filter(|w| w.test_strategy == strategy) {
        if let Some(script) = non_empty(entry.script.as_deref()) {
            resolved.script = Some(script.to_string());
        }
        if let Some(conf) = non_empty(entry.conf.as_deref()) {
            resolved.conf = Some(conf.to_string());
        }
    }
    resolved
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
