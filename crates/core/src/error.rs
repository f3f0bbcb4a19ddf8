// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for test runs.
//!
//! Only the `Display` text of these errors crosses the external boundary: every
//! fatal [`RunError`] ends up as the `message` of a finished notification.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to retrieve or materialize a resource from the configuration store.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The store answered, but has no resource at this logical path.
    ///
    /// For the workload catalog this is a valid state ("no catalog"), for
    /// selected scripts and parameter files it is fatal.
    #[error("resource {path} not found")]
    NotFound { path: String },

    /// The store could not be reached or refused the request.
    ///
    /// Examples:
    /// - Connection refused / timeout
    /// - Unexpected HTTP status
    /// - Undecodable response body
    #[error("failed to fetch resource {path}: {message}")]
    Store { path: String, message: String },

    /// Writing the materialized resource into the scratch directory failed.
    #[error("failed to write resource {path} to {}: {source}", .target.display())]
    Write {
        path: String,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn store(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Store { path: path.into(), message: message.to_string() }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The workload catalog exists but is not a valid document.
#[derive(Debug, Error)]
#[error("could not parse {path}: {message}")]
pub struct ParseError {
    pub path: String,
    pub message: String,
}

/// The external load-test process could not be launched or did not succeed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch `{command} {}`: {source}", .args.join(" "))]
    Launch {
        command: String,
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command} {}` exited with {status}: {output}", .args.join(" "))]
    Failed { command: String, args: Vec<String>, status: String, output: String },
}

/// A lifecycle notification could not be delivered to the event bus.
#[derive(Debug, Error)]
#[error("failed to send {event} event: {message}")]
pub struct NotificationError {
    pub event: &'static str,
    pub message: String,
}

/// Every fatal condition of a single run.
///
/// Each variant maps to a finished notification with `status=errored` and
/// `result=fail`.
#[derive(Debug, Error)]
pub enum RunError {
    /// The trigger event carries neither a public nor a local deployment URI.
    #[error("no deployment URI included in event")]
    NoDeploymentUri,

    #[error("invalid deployment URI {uri}: {message}")]
    InvalidDeploymentUri { uri: String, message: String },

    #[error("failed to create scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),

    #[error("failed to load workload catalog: {0}")]
    Catalog(#[source] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to fetch {kind} {path}: {source}")]
    Artifact {
        kind: &'static str,
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to fetch sibling resources: {0}")]
    Siblings(#[source] FetchError),

    #[error("failed to rewrite {}: {source}", .path.display())]
    Rewrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Convenience type alias for Results using `RunError`.
pub type Result<T> = std::result::Result<T, RunError>;
