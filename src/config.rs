use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{TapFlowError, TapFlowResult};

/// Process-wide settings, loaded once at startup and injected into every
/// task at construction. Never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub vision: VisionConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Vision element-detection service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub base_url: String,
    /// API key stored in config.toml (falls back to env var TAPFLOW_VISION_KEY).
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_vision_timeout")]
    pub timeout_secs: u64,
}

impl VisionConfig {
    pub fn resolve_key(&self) -> String {
        self.key
            .clone()
            .or_else(|| std::env::var("TAPFLOW_VISION_KEY").ok())
            .unwrap_or_default()
    }
}

fn default_vision_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    /// Public base URL for uploaded objects; defaults to `{endpoint}/{bucket}`.
    #[serde(default)]
    pub public_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// W3C WebDriver endpoint for the browser backend.
    #[serde(default)]
    pub webdriver_url: Option<String>,
    /// WebDriverAgent endpoint for the iOS backend.
    #[serde(default)]
    pub wda_url: Option<String>,
    /// adb serial; the first connected device is used when absent.
    #[serde(default)]
    pub adb_serial: Option<String>,
    /// hdc connect key; the first connected device is used when absent.
    #[serde(default)]
    pub hdc_connect_key: Option<String>,
    /// Deep-link template for mobile open_url, with a `{url}` placeholder.
    /// The raw URL is percent-encoded before substitution.
    #[serde(default)]
    pub deeplink_template: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
}

fn default_true() -> bool {
    true
}

// A derived Default would turn headless off when the [device] table is
// absent, diverging from the serde default used when it is present.
impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            wda_url: None,
            adb_serial: None,
            hdc_connect_key: None,
            deeplink_template: None,
            headless: true,
        }
    }
}

fn resolve_config_path() -> TapFlowResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(TapFlowError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> TapFlowResult<Settings> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), vision = %settings.vision.base_url, "config loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let settings: Settings = toml::from_str(
            r#"
            [vision]
            base_url = "http://omni.local"

            [storage]
            endpoint = "http://minio.local:9000"
            bucket = "tapflow"
            "#,
        )
        .unwrap();
        assert_eq!(settings.vision.timeout_secs, 120);
        assert!(settings.device.headless);
    }

    #[test]
    fn device_defaults_match_with_and_without_table() {
        let without = DeviceConfig::default();
        let with: DeviceConfig = toml::from_str("").unwrap();
        assert!(without.headless);
        assert_eq!(without.headless, with.headless);
        assert!(without.webdriver_url.is_none());
    }
}
