// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Locust Service Core - workload resolution and the run lifecycle of the
//! Keptn locust test runner.
//!
//! A run takes one "test triggered" event, selects a script and an optional
//! parameter file for the requested test strategy, materializes them into a
//! private scratch directory, runs `locust` against the deployment and reports
//! started / status-changed / finished notifications.
//!
//! ## Core Modules
//!
//! - [`catalog`]: workload catalog parsing and strategy resolution
//! - [`context`]: trigger events, run scope and URL selection
//! - [`store`]: `ResourceStore` trait and materialization of resources
//! - [`rewrite`]: script directive rewriting in parameter files
//! - [`environment`]: secret-derived environment for the load test
//! - [`command`]: argument assembly
//! - [`executor`]: `ProcessRunner` trait and the subprocess implementation
//! - [`reporter`]: `EventSink` trait and exactly-once lifecycle reporting
//! - [`runner`]: the run state machine tying everything together
//! - [`error`]: error types
//!
//! Everything outside the process boundary (configuration store, event bus,
//! secrets) is reached through a trait, so adapters live in the service crate.

// Re-export async_trait for adapter implementations
pub use async_trait::async_trait;

pub mod catalog;
pub mod command;
pub mod context;
pub mod environment;
pub mod error;
pub mod executor;
pub mod reporter;
pub mod rewrite;
pub mod runner;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use catalog::{ResolvedRun, WorkloadCatalog, WorkloadEntry};
pub use command::DefaultRunParameters;
pub use context::{RunContext, RunScope, TriggerEvent};
pub use environment::{NamespaceSource, RunEnvironmentBuilder, SecretError, SecretStore};
pub use error::{ExecutionError, FetchError, NotificationError, ParseError, RunError};
pub use executor::{ProcessRunner, SubprocessRunner};
pub use reporter::{
    EventReporter, EventSink, Notification, RunCorrelation, RunOutcome, RunStatus, StartedRun,
    TestResult,
};
pub use runner::{RunPhase, RunnerConfig, TestRunner};
pub use store::{ResourceFetcher, ResourceStore};
