pub mod android;
pub mod harmony;
pub mod ios;
pub mod web;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::errors::{TapFlowError, TapFlowResult};

/// Device pixel size, queried once at device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSize {
    pub width: u32,
    pub height: u32,
}

/// Symbolic swipe direction. `Top` moves the content up (finger travels from
/// 0.7 to 0.1 of the height), `Bottom` the reverse; horizontal is analogous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
    Top,
    Bottom,
}

impl SwipeDirection {
    /// Concrete start/end points for one gesture, as device-size fractions.
    pub fn track(self, size: DeviceSize) -> (i32, i32, i32, i32) {
        let (w, h) = (size.width as f64, size.height as f64);
        let (x1, y1, x2, y2) = match self {
            SwipeDirection::Top => (0.5 * w, 0.7 * h, 0.5 * w, 0.1 * h),
            SwipeDirection::Bottom => (0.5 * w, 0.3 * h, 0.5 * w, 0.9 * h),
            SwipeDirection::Left => (0.7 * w, 0.5 * h, 0.1 * w, 0.5 * h),
            SwipeDirection::Right => (0.3 * w, 0.5 * h, 0.9 * w, 0.5 * h),
        };
        (x1 as i32, y1 as i32, x2 as i32, y2 as i32)
    }
}

/// Backend variant, selected once at task creation and never mixed within a
/// task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Web,
    Android,
    Harmony,
    Ios,
}

/// Uniform capability set over the four backends. Transport and driver
/// errors are not caught here; they propagate to the tool pipeline for
/// uniform classification.
#[async_trait]
pub trait Device: Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// Cached pixel size.
    fn size(&self) -> DeviceSize;

    async fn click(&self, x: i32, y: i32) -> TapFlowResult<()>;

    /// Focuses the coordinate, types the text, optionally sends Enter.
    async fn input_text(&self, x: i32, y: i32, text: &str, send_enter: bool) -> TapFlowResult<()>;

    /// Exactly one discrete gesture per call; looping is the repeat-loop
    /// component's job, not the backend's.
    async fn swipe(&self, direction: SwipeDirection) -> TapFlowResult<()> {
        let (x1, y1, x2, y2) = direction.track(self.size());
        self.swipe_between(x1, y1, x2, y2).await
    }

    async fn swipe_between(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> TapFlowResult<()>;

    async fn screenshot(&self) -> TapFlowResult<Vec<u8>>;

    async fn open_url(&self, url: &str) -> TapFlowResult<()>;

    async fn go_back(&self) -> TapFlowResult<()>;

    async fn go_home(&self) -> TapFlowResult<()>;

    async fn list_installed_apps(&self) -> TapFlowResult<Vec<String>>;

    /// Launches an installed app by package/bundle identifier.
    async fn launch_app(&self, id: &str) -> TapFlowResult<()>;

    /// Releases the backend session. The tear_down tool calls this exactly
    /// once per task.
    async fn close(&self) -> TapFlowResult<()>;
}

/// Async factory for the selected backend. Creation failure is fatal for the
/// task: it aborts before any step executes and is not retried here.
pub async fn connect(kind: DeviceKind, settings: &Settings) -> TapFlowResult<Arc<dyn Device>> {
    let device: Arc<dyn Device> = match kind {
        DeviceKind::Web => Arc::new(web::WebDevice::create(settings).await?),
        DeviceKind::Android => Arc::new(android::AndroidDevice::create(settings).await?),
        DeviceKind::Harmony => Arc::new(harmony::HarmonyDevice::create(settings).await?),
        DeviceKind::Ios => Arc::new(ios::IosDevice::create(settings).await?),
    };
    tracing::info!(kind = ?kind, size = ?device.size(), "device connected");
    Ok(device)
}

/// Percent-encodes `url` into the configured deep-link template, for mobile
/// backends whose client apps open URLs through a custom scheme.
pub(crate) fn apply_deeplink(template: Option<&str>, url: &str) -> String {
    match template {
        Some(template) => {
            let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
            template.replace("{url}", &encoded)
        }
        None => url.to_string(),
    }
}

pub(crate) fn device_error(message: impl Into<String>) -> TapFlowError {
    TapFlowError::Device(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swipe_track_uses_size_fractions() {
        let size = DeviceSize { width: 1000, height: 2000 };
        assert_eq!(SwipeDirection::Top.track(size), (500, 1400, 500, 200));
        assert_eq!(SwipeDirection::Bottom.track(size), (500, 600, 500, 1800));
        assert_eq!(SwipeDirection::Left.track(size), (700, 1000, 100, 1000));
        assert_eq!(SwipeDirection::Right.track(size), (300, 1000, 900, 1000));
    }

    #[test]
    fn deeplink_template_encodes_url() {
        let link = apply_deeplink(
            Some("musicapp://open?u={url}"),
            "https://example.com/a?b=1",
        );
        assert_eq!(link, "musicapp://open?u=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1");
        assert_eq!(apply_deeplink(None, "https://example.com"), "https://example.com");
    }
}
