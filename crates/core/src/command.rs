// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Argument assembly for the load-test process.

use std::path::Path;

/// Parameters passed when a run has no parameter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRunParameters {
    pub users: u32,
    /// Locust duration string, e.g. `2m` or `90s`.
    pub run_time: String,
}

impl Default for DefaultRunParameters {
    fn default() -> Self {
        Self { users: 10, run_time: "2m".to_string() }
    }
}

/// Builds the arguments for one run.
///
/// Returns `None` when neither a script nor a parameter file is present, meaning
/// there is nothing to run. A parameter file and the default user/run-time
/// arguments are mutually exclusive.
pub fn assemble(
    script: Option<&Path>,
    conf: Option<&Path>,
    target_url: &str,
    defaults: &DefaultRunParameters,
) -> Option<Vec<String>> {
    let script = script.filter(|p| !p.as_os_str().is_empty());
    let conf = conf.filter(|p| !p.as_os_str().is_empty());
    if script.is_none() && conf.is_none() {
        return None;
    }

    let mut args = vec![
        "--headless".to_string(),
        "--only-summary".to_string(),
        format!("--host={target_url}"),
    ];

    if let Some(script) = script {
        args.push(format!("-f={}", script.display()));
    }

    match conf {
        Some(conf) => args.push(format!("--config={}", conf.display())),
        None => {
            args.push(format!("--users={}", defaults.users));
            args.push(format!("--run-time={}", defaults.run_time));
        },
    }

    Some(args)
}
