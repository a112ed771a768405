// Credential store
// Plain JSON key/value file holding the GitHub token between sessions

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{AutobuildError, AutobuildResult};

/// File name inside `{config_dir}/autobuild`
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Key of the GitHub token
pub const TOKEN_KEY: &str = "github_token";

fn store_error(message: impl Into<String>) -> AutobuildError {
    AutobuildError::CredentialStore {
        message: message.into(),
    }
}

/// Keyed store backed by one JSON object on disk.
///
/// Values are stored unencrypted.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{config_dir}/autobuild/credentials.json`
    pub fn default_location() -> AutobuildResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| store_error("Could not determine config directory"))?;
        Ok(Self::new(dir.join("autobuild").join(CREDENTIALS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> AutobuildResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(store_error(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    fn write_all(&self, map: &Map<String, Value>) -> AutobuildResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> AutobuildResult<Option<String>> {
        Ok(self
            .read_all()?
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    pub fn set(&self, key: &str, value: &str) -> AutobuildResult<()> {
        let mut map = self.read_all()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&map)
    }

    /// Remove `key`; returns whether it was present
    pub fn remove(&self, key: &str) -> AutobuildResult<bool> {
        let mut map = self.read_all()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_all(&map)?;
        }
        Ok(existed)
    }

    /// Stored token, ignoring blank values
    pub fn token(&self) -> AutobuildResult<Option<String>> {
        Ok(self.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty()))
    }

    pub fn set_token(&self, token: &str) -> AutobuildResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AutobuildError::validation("Token must not be empty"));
        }
        self.set(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> AutobuildResult<bool> {
        self.remove(TOKEN_KEY)
    }
}
