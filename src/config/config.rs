use crate::fetch::{HttpSettings, RequestQueue, RetryPolicy};
use crate::packages::ProjectPackages;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use url::Url;

/// The default configuration YAML content, embedded from `default_config.yaml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../default_config.yaml");

/// File picked up from the working directory when no `--config` is given
pub const CONFIG_FILE_NAME: &str = "org-snapshot.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// GitHub organization whose repositories and contributors are collected
    pub organization: String,

    /// Directory the JSON snapshot files are written to
    pub assets_dir: Utf8PathBuf,

    pub cms: CmsConfig,
    pub github: GitHubConfig,
    pub npm: NpmConfig,
    pub pypi: PypiConfig,
    pub http: HttpConfig,

    /// Packages published by each project
    pub projects: Vec<ProjectPackages>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CmsConfig {
    pub endpoint: Url,

    /// Only projects with this status are fetched
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    pub api_url: Url,
    pub skip_archived: bool,

    /// Logins never listed as contributors, in addition to bot accounts
    pub excluded_logins: Vec<String>,

    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NpmConfig {
    pub api_url: Url,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PypiConfig {
    pub api_url: Url,

    /// Base URL of the pages scraped for all-time totals
    pub totals_url: Url,

    pub queue: QueueConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Requests in flight at once
    pub concurrency: usize,

    /// How long a finished request keeps its slot
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl QueueConfig {
    /// A request queue with these limits.
    #[must_use]
    pub fn to_queue(self, name: &str) -> RequestQueue {
        RequestQueue::new(name, self.concurrency, self.delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,

    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_jitter: Duration,
}

impl RetryConfig {
    #[must_use]
    pub const fn to_policy(self) -> RetryPolicy {
        RetryPolicy::rate_limited(self.max_attempts, self.initial_delay, self.max_jitter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    pub retries: u32,

    #[serde(with = "humantime_serde")]
    pub backoff_step: Duration,
}

impl HttpConfig {
    #[must_use]
    pub const fn to_settings(self) -> HttpSettings {
        HttpSettings {
            timeout: self.timeout,
            retries: self.retries,
            backoff_step: self.backoff_step,
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// An explicit `config_path` must exist. Otherwise `org-snapshot.yaml` in `search_dir` is used
    /// when present, and the embedded defaults when not.
    pub fn load(search_dir: &Utf8Path, config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).with_context(|| format!("reading configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            let path = search_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: super::LOG_TARGET, "No '{CONFIG_FILE_NAME}' in '{search_dir}', using the default configuration");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).with_context(|| format!("reading configuration file '{path}'")),
            }
        };

        let config = Self::from_yaml(&text).with_context(|| format!("loading configuration file '{final_path}'"))?;
        log::debug!(target: super::LOG_TARGET, "Loaded configuration from '{final_path}'");
        Ok(config)
    }

    /// Parse a config document layered over the defaults, then validate it.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut merged: Value = serde_yaml::from_str(DEFAULT_CONFIG_YAML).context("parsing the default configuration")?;
        let overrides: Value = serde_yaml::from_str(text).context("parsing YAML")?;
        merge_values(&mut merged, overrides);

        let config: Self = serde_yaml::from_value(merged).context("interpreting configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save the default configuration to a YAML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_YAML).with_context(|| format!("writing default configuration to '{output_path}'"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.organization.trim().is_empty() {
            bail!("organization must not be empty");
        }

        if self.http.retries == 0 {
            bail!("http.retries must be at least 1");
        }

        for (section, retry) in [("github", &self.github.retry), ("npm", &self.npm.retry), ("pypi", &self.pypi.retry)] {
            if retry.max_attempts == 0 {
                bail!("{section}.retry.max_attempts must be at least 1");
            }
        }

        for (section, queue) in [("npm", &self.npm.queue), ("pypi", &self.pypi.queue)] {
            if queue.concurrency == 0 {
                bail!("{section}.queue.concurrency must be at least 1");
            }
        }

        for (key, url) in [
            ("cms.endpoint", &self.cms.endpoint),
            ("github.api_url", &self.github.api_url),
            ("npm.api_url", &self.npm.api_url),
            ("pypi.api_url", &self.pypi.api_url),
            ("pypi.totals_url", &self.pypi.totals_url),
        ] {
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                bail!("{key} must be an http(s) URL, got '{url}'");
            }
        }

        let mut seen = HashSet::new();
        for project in &self.projects {
            for package in &project.packages {
                if package.name.trim().is_empty() {
                    bail!("project '{}' declares a package with an empty name", project.project);
                }

                if !seen.insert(package.name.as_str()) {
                    bail!("package '{}' is declared more than once", package.name);
                }
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_CONFIG_YAML).expect("default_config.yaml should be valid YAML that deserializes to Config")
    }
}

/// Overlay `overrides` onto `base`: mappings merge key by key, anything else replaces.
fn merge_values(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        _ = base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
