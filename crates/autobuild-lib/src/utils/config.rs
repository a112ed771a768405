// Application configuration
// Defaults, optional autobuild.toml, then AUTOBUILD_* environment overrides

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutobuildError, AutobuildResult};
use crate::services::github::DEFAULT_API_BASE;
use crate::services::proxy_server::{ProxyOptions, DEFAULT_BASE_PATH, DEFAULT_MAX_BODY_BYTES};
use crate::services::run_monitor::MonitorConfig;

/// Config file looked up in the working directory, then the config dir
pub const CONFIG_FILE: &str = "autobuild.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "AUTOBUILD_";

/// Proxy base used by clients running on `localhost`
pub const LOCAL_API_BASE: &str = "http://localhost:3000/api";

fn default_owner() -> String {
    String::from("tomas95-lab")
}

fn default_repo() -> String {
    String::from("autobuild_test")
}

fn default_workflow_file() -> String {
    String::from("autobuild-v2.yml")
}

fn default_git_ref() -> String {
    String::from("main")
}

fn default_github_api_url() -> String {
    String::from(DEFAULT_API_BASE)
}

fn default_host() -> String {
    String::from("localhost")
}

fn default_listen_host() -> String {
    String::from("127.0.0.1")
}

fn default_listen_port() -> u16 {
    3000
}

fn default_base_path() -> String {
    String::from(DEFAULT_BASE_PATH)
}

fn default_settle_delay_ms() -> u64 {
    3000
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Upload proxy base for a client served from `host`
pub fn api_base_for_host(host: &str) -> &'static str {
    if host == "localhost" {
        LOCAL_API_BASE
    } else {
        DEFAULT_BASE_PATH
    }
}

/// Autobuild settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Repository owner that hosts releases and the workflow
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_repo")]
    pub repo: String,
    /// Workflow file dispatched for every task
    #[serde(default = "default_workflow_file")]
    pub workflow_file: String,
    /// Git ref the workflow runs on
    #[serde(default = "default_git_ref")]
    pub git_ref: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    /// Host the client considers itself served from
    #[serde(default = "default_host")]
    pub host: String,
    /// Origin joined to a relative proxy base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_origin: Option<String>,
    /// Explicit proxy base, bypasses host resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Route prefix of the proxy server
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            workflow_file: default_workflow_file(),
            git_ref: default_git_ref(),
            github_api_url: default_github_api_url(),
            host: default_host(),
            public_origin: None,
            api_base: None,
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            base_path: default_base_path(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn config_error(message: impl Into<String>) -> AutobuildError {
    AutobuildError::Config {
        message: message.into(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> AutobuildResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| config_error(format!("{}{} must be a number, got '{}'", ENV_PREFIX, key, value)))
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> AutobuildResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Failed to parse config: {}", e)))
    }

    /// Read a config file; a missing file is an error
    pub fn from_file(path: &Path) -> AutobuildResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Candidate config file locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("autobuild").join(CONFIG_FILE));
        }
        paths
    }

    /// Load `explicit` (must exist) or the first existing search path, then
    /// apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> AutobuildResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::search_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    log::debug!("[config] Loading {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };

        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AUTOBUILD_*` overrides from `vars`. Unknown keys are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> AutobuildResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "OWNER" => self.owner = value,
                "REPO" => self.repo = value,
                "WORKFLOW" => self.workflow_file = value,
                "REF" => self.git_ref = value,
                "GITHUB_API_URL" => self.github_api_url = value,
                "HOST" => self.host = value,
                "PUBLIC_ORIGIN" => self.public_origin = Some(value),
                "API_BASE" => self.api_base = Some(value),
                "LISTEN_HOST" => self.listen_host = value,
                "PORT" => self.listen_port = parse_number(key, &value)?,
                "BASE_PATH" => self.base_path = value,
                "SETTLE_DELAY_MS" => self.settle_delay_ms = parse_number(key, &value)?,
                "POLL_INTERVAL_MS" => self.poll_interval_ms = parse_number(key, &value)?,
                "MAX_BODY_BYTES" => self.max_body_bytes = parse_number(key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> AutobuildResult<()> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(config_error("owner and repo must be set"));
        }
        if self.workflow_file.trim().is_empty() {
            return Err(config_error("workflow_file must be set"));
        }
        if self.poll_interval_ms == 0 {
            return Err(config_error("poll_interval_ms must be greater than zero"));
        }
        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(config_error("base_path must start with '/'"));
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn proxy_options(&self) -> ProxyOptions {
        ProxyOptions {
            base_path: self.base_path.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }

    pub fn listen_addr(&self) -> AutobuildResult<SocketAddr> {
        let ip: IpAddr = self
            .listen_host
            .parse()
            .map_err(|_| config_error(format!("Invalid listen_host '{}'", self.listen_host)))?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// Absolute URL of the upload proxy base.
    ///
    /// `api_base` wins when set. Otherwise the base follows the host rule;
    /// a relative base needs `public_origin` to become absolute.
    pub fn upload_api_base(&self) -> AutobuildResult<String> {
        if let Some(base) = self.api_base.as_deref().filter(|b| !b.trim().is_empty()) {
            return Ok(base.trim_end_matches('/').to_string());
        }

        let base = api_base_for_host(&self.host);
        if !base.starts_with('/') {
            return Ok(base.to_string());
        }

        match self.public_origin.as_deref().filter(|o| !o.trim().is_empty()) {
            Some(origin) => Ok(format!("{}{}", origin.trim_end_matches('/'), base)),
            None => Err(config_error(format!(
                "public_origin is required to reach the proxy from host '{}'",
                self.host
            ))),
        }
    }
}
