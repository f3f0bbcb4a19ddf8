// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use locust_service_core::{DefaultRunParameters, RunnerConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Prefix of environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "LS_";

const fn default_true() -> bool {
    true
}

const fn default_queue_capacity() -> usize {
    64
}

const fn default_request_timeout_secs() -> u64 {
    30
}

/// Identity of this service on the event bus.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServiceConfig {
    /// Used as the `source` of every outbound CloudEvent.
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { name: "locust-service".to_string() }
    }
}

/// HTTP receiver configuration.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServerConfig {
    pub address: String,
    /// Trigger events waiting for the worker; further events are refused with 503.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: "0.0.0.0:8080".to_string(), queue_capacity: default_queue_capacity() }
    }
}

/// Endpoints of the Keptn control plane.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct KeptnConfig {
    pub configuration_service_url: String,
    /// Full URL outbound CloudEvents are POSTed to.
    pub event_broker_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for KeptnConfig {
    fn default() -> Self {
        Self {
            configuration_service_url: "http://configuration-service:8080".to_string(),
            event_broker_url: "http://localhost:8081/event".to_string(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Where load-test resources come from.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ResourcesConfig {
    /// Read resources from this directory instead of the configuration service.
    #[serde(default)]
    pub local_dir: Option<String>,
    /// Fetch every other `locust/` resource when a parameter file is used.
    #[serde(default = "default_true")]
    pub fetch_siblings: bool,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self { local_dir: None, fetch_siblings: true }
    }
}

/// Load test invocation.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct RunnerSection {
    pub command: String,
    /// `--users` passed when no parameter file is configured.
    pub default_users: u32,
    /// `--run-time` passed when no parameter file is configured.
    pub default_run_time: String,
    #[serde(default = "default_true")]
    pub status_updates: bool,
}

impl Default for RunnerSection {
    fn default() -> Self {
        let defaults = DefaultRunParameters::default();
        Self {
            command: "locust".to_string(),
            default_users: defaults.users,
            default_run_time: defaults.run_time,
            status_updates: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// Kubernetes Secrets API with in-cluster service account credentials.
    #[default]
    Kubernetes,
    /// One sub-directory per secret, one file per key.
    Directory,
    Disabled,
}

/// Secret lookup for per-service environment variables.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SecretsConfig {
    #[serde(default)]
    pub backend: SecretBackend,
    /// Environment variable naming the namespace secrets are read from.
    pub namespace_env: String,
    pub default_namespace: String,
    /// Root of the `directory` backend.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::default(),
            namespace_env: locust_service_core::environment::NAMESPACE_ENV.to_string(),
            default_namespace: locust_service_core::environment::DEFAULT_NAMESPACE.to_string(),
            directory: None,
        }
    }
}

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LogConfig {
    #[serde(default)]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: "./locust-service.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

/// Root configuration for the locust service.
#[derive(Deserialize, Serialize, Default, Debug, Clone, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub keptn: KeptnConfig,

    #[serde(default)]
    pub resources: ResourcesConfig,

    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            command: self.runner.command.clone(),
            defaults: DefaultRunParameters {
                users: self.runner.default_users,
                run_time: self.runner.default_run_time.clone(),
            },
            fetch_siblings: self.resources.fetch_siblings,
            status_updates: self.runner.status_updates,
        }
    }
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads the configuration from defaults, a TOML file, and `LS_` environment variables.
///
/// # Errors
///
/// Returns an error if the configuration file exists but is not valid TOML, or
/// if a value (from the file or the environment) has the wrong type.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment =
        Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;

    // A missing file is not an error; defaults and environment still apply
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration as a pretty-printed TOML string.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized to TOML.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}
