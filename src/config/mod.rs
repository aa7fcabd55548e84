//! Wizard configuration and its JSON persistence.
//!
//! | Variable | Overrides |
//! |---|---|
//! | `CATALOG_WIZARD_API_URL` | `api_base_url` |
//! | `CATALOG_WIZARD_DEBOUNCE_MS` | `debounce_ms` |
//! | `CATALOG_WIZARD_TOKEN` | `auth_token` |

use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::WizardError, utils};

const TMP_SUFFIX: &str = "tmp";

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const MAX_DEBOUNCE_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub api_base_url: String,
    /// Quiet period between the last field change and the live validation pass.
    pub debounce_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            connect_timeout_secs: 2,
            request_timeout_secs: 10,
            auth_token: None,
        }
    }
}

impl WizardConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = u64::try_from(debounce.as_millis())
            .unwrap_or(u64::MAX)
            .min(MAX_DEBOUNCE_MS);
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Applies `CATALOG_WIZARD_*` environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("CATALOG_WIZARD_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(raw) = env::var("CATALOG_WIZARD_DEBOUNCE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid CATALOG_WIZARD_DEBOUNCE_MS"),
            }
        }
        if let Ok(token) = env::var("CATALOG_WIZARD_TOKEN") {
            self.auth_token = Some(token).filter(|t| !t.trim().is_empty());
        }
        self.validated()
    }

    /// Clamps values to safe ranges and normalises the base URL.
    pub fn validated(mut self) -> Self {
        self.debounce_ms = self.debounce_ms.min(MAX_DEBOUNCE_MS);
        self.connect_timeout_secs = self.connect_timeout_secs.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(self.connect_timeout_secs);
        while self.api_base_url.ends_with('/') {
            self.api_base_url.pop();
        }
        self
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default location under the application data directory.
    pub fn new() -> Self {
        Self::with_path(utils::config_file())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the stored configuration, or defaults when none exists yet.
    /// Environment overrides are applied in both cases.
    pub fn load(&self) -> Result<WizardConfig, WizardError> {
        let config = if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            serde_json::from_str::<WizardConfig>(&data)?
        } else {
            WizardConfig::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn save(&self, config: &WizardConfig) -> Result<(), WizardError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), WizardError> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validated_clamps_debounce_and_trims_url() {
        let config = WizardConfig {
            api_base_url: "http://example.test/api//".into(),
            debounce_ms: 60_000,
            connect_timeout_secs: 0,
            request_timeout_secs: 0,
            auth_token: None,
        }
        .validated();
        assert_eq!(config.debounce_ms, MAX_DEBOUNCE_MS);
        assert_eq!(config.api_base_url, "http://example.test/api");
        assert_eq!(config.connect_timeout_secs, 1);
        assert_eq!(config.request_timeout_secs, 1);
    }

    #[test]
    fn tmp_path_appends_suffix() {
        let tmp = tmp_path(Path::new("/x/config.json"));
        assert_eq!(tmp, PathBuf::from("/x/config.json.tmp"));
    }
}
