// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::sync::Arc;

use crate::config::Config;
use crate::worker::RunQueue;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: RunQueue,
}
