use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

pub const EMAIL_KEY: &str = "email";
pub const PASSWORD_KEY: &str = "password";
pub const LABEL_KEY: &str = "label";
pub const TEMPLATE_KEY: &str = "template";
pub const AUTO_IMPORT_KEY: &str = "auto-import";
pub const IMPORTED_IDS_KEY: &str = "ids";
/// Secret-store key holding the sealed password.
pub const SEALED_PASSWORD_KEY: &str = "otter-password";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Settings file {path} is not a JSON object: {message}")]
    Corrupt { path: String, message: String },
    #[error("Setting `{key}` has unexpected type, expected {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// Key/value settings of the host application.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, SettingsError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), SettingsError>;
    async fn remove(&self, key: &str) -> Result<(), SettingsError>;

    async fn get_string(&self, key: &str) -> Result<Option<String>, SettingsError> {
        match self.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(SettingsError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    /// Flags are considered set when stored as `true` or as a non-empty string.
    async fn get_flag(&self, key: &str) -> Result<bool, SettingsError> {
        Ok(match self.get(key).await? {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => !s.trim().is_empty() && s != "false",
            _ => false,
        })
    }

    async fn get_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, SettingsError> {
        match self.get(key).await? {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => Ok(map
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect()),
            Some(_) => Err(SettingsError::WrongType {
                key: key.to_string(),
                expected: "object",
            }),
        }
    }
}

/// Local store for secrets that must not live in the synced settings.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, key: &str) -> Result<Option<String>, SettingsError>;
    async fn set_secret(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: DashMap<String, Value>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let store = Self::new();
        for (key, value) in values {
            store.values.insert(key.into(), value);
        }
        store
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.values.remove(key);
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemorySettings {
    async fn get_secret(&self, key: &str) -> Result<Option<String>, SettingsError> {
        self.get_string(key).await
    }

    async fn set_secret(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set(key, Value::String(value.to_string())).await
    }
}

/// Settings persisted as one JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash leaves either the old or the new content.
pub struct JsonFileSettings {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn load(&self) -> Result<Map<String, Value>, SettingsError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(SettingsError::Corrupt {
                path: self.path.display().to_string(),
                message: format!("found {}", json_type(&other)),
            }),
            Err(e) => Err(SettingsError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn store(&self, map: Map<String, Value>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let body = serde_json::to_string_pretty(&Value::Object(map)).map_err(|e| {
            SettingsError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Wrote settings to {}", self.path.display());
        Ok(())
    }

    async fn update<F>(&self, f: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        f(&mut map);
        self.store(map).await
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.update(|map| {
            map.remove(key);
        })
        .await
    }
}

#[async_trait]
impl SecretStore for JsonFileSettings {
    async fn get_secret(&self, key: &str) -> Result<Option<String>, SettingsError> {
        self.get_string(key).await
    }

    async fn set_secret(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set(key, Value::String(value.to_string())).await
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
