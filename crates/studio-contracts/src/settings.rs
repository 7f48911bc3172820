use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

const CREDENTIAL_KEY: &str = "api_key";
const ENDPOINT_KEY: &str = "proxy_url";

/// The two user-level strings kept across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub credential: Option<String>,
    pub endpoint_override: Option<String>,
}

impl Settings {
    fn from_object(payload: &Map<String, Value>) -> Self {
        Self {
            credential: non_empty_string(payload.get(CREDENTIAL_KEY)),
            endpoint_override: non_empty_string(payload.get(ENDPOINT_KEY)),
        }
    }
}

/// JSON-file key/value store for [`Settings`].
///
/// Writes re-read the file and only overwrite the keys this instance changed,
/// so two stores pointed at the same file do not clobber each other.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        Settings::from_object(&read_json_object(&self.path).unwrap_or_default())
    }

    pub fn set_credential(&self, credential: Option<&str>) -> anyhow::Result<Settings> {
        self.write_key(CREDENTIAL_KEY, credential)
    }

    pub fn set_endpoint_override(&self, endpoint: Option<&str>) -> anyhow::Result<Settings> {
        self.write_key(ENDPOINT_KEY, endpoint)
    }

    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        self.write_key(CREDENTIAL_KEY, settings.credential.as_deref())?;
        self.write_key(ENDPOINT_KEY, settings.endpoint_override.as_deref())?;
        Ok(())
    }

    fn write_key(&self, key: &str, value: Option<&str>) -> anyhow::Result<Settings> {
        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        let value = value.map(str::trim).unwrap_or_default();
        on_disk.insert(key.to_string(), Value::String(value.to_string()));
        write_json_object(&self.path, &on_disk)?;
        Ok(Settings::from_object(&on_disk))
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
