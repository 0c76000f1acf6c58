//! Tool configuration, layered over embedded defaults.

#[expect(clippy::module_inception, reason = "I like it this way")]
mod config;

pub use config::{
    CONFIG_FILE_NAME, CmsConfig, Config, DEFAULT_CONFIG_YAML, GitHubConfig, HttpConfig, NpmConfig, PypiConfig, QueueConfig,
    RetryConfig,
};

/// Log target for configuration loading
const LOG_TARGET: &str = "config";
