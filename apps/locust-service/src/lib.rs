// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

pub mod cli;
pub mod config;
pub mod events;
pub mod logging;
pub mod resources;
pub mod secrets;
pub mod server;
pub mod state;
pub mod worker;

// Re-export commonly used items for convenience
pub use config::Config;
pub use worker::{build_runner, spawn_worker, RunQueue};
