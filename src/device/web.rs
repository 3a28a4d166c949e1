use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::device::{device_error, Device, DeviceKind, DeviceSize};
use crate::errors::TapFlowResult;

/// How long a click waits for a newly opened page before proceeding on the
/// current one.
const NEW_PAGE_WINDOW: Duration = Duration::from_millis(1000);
const NEW_PAGE_POLL: Duration = Duration::from_millis(200);

const KEY_ENTER: char = '\u{E007}';

#[derive(Debug, Deserialize)]
struct WdValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct WdSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WdRect {
    width: f64,
    height: f64,
}

/// Browser backend over a W3C WebDriver HTTP endpoint.
///
/// The active window handle is the one piece of task-local mutable shared
/// state in the engine: a click may open a new page, in which case the handle
/// is atomically rebound and the previous window closed. This is safe only
/// because the tool pipeline guarantees single-flight execution.
pub struct WebDevice {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    size: DeviceSize,
    active_handle: Mutex<String>,
}

impl WebDevice {
    pub async fn create(settings: &Settings) -> TapFlowResult<Self> {
        let base_url = settings
            .device
            .webdriver_url
            .clone()
            .ok_or_else(|| device_error("device.webdriver_url is not configured"))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        let mut args = Vec::new();
        if settings.device.headless {
            args.push("-headless");
        }
        let session: WdValue<WdSession> = client
            .post(format!("{base_url}/session"))
            .json(&json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "firefox",
                        "moz:firefoxOptions": { "args": args }
                    }
                }
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let session_id = session.value.session_id;

        let device = Self {
            client,
            base_url,
            session_id,
            size: DeviceSize { width: 0, height: 0 },
            active_handle: Mutex::new(String::new()),
        };

        device
            .post("window/rect", json!({ "width": 1600, "height": 900 }))
            .await?;
        let rect: WdValue<WdRect> = device.get_json("window/rect").await?;
        let size = DeviceSize {
            width: rect.value.width as u32,
            height: rect.value.height as u32,
        };
        let handle: WdValue<String> = device.get_json("window").await?;
        *device.active_handle.lock().await = handle.value;

        Ok(Self { size, ..device })
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}/{}", self.base_url, self.session_id, path)
    }

    async fn post(&self, path: &str, body: Value) -> TapFlowResult<()> {
        self.client
            .post(self.session_url(path))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> TapFlowResult<T> {
        let value = self
            .client
            .get(self.session_url(path))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }

    async fn perform_actions(&self, actions: Value) -> TapFlowResult<()> {
        self.post("actions", json!({ "actions": actions })).await?;
        self.client
            .delete(self.session_url("actions"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn window_handles(&self) -> TapFlowResult<Vec<String>> {
        let handles: WdValue<Vec<String>> = self.get_json("window/handles").await?;
        Ok(handles.value)
    }

    async fn pointer_click(&self, x: i32, y: i32) -> TapFlowResult<()> {
        self.perform_actions(json!([{
            "type": "pointer",
            "id": "mouse",
            "parameters": { "pointerType": "mouse" },
            "actions": [
                { "type": "pointerMove", "duration": 0, "x": x, "y": y },
                { "type": "pointerDown", "button": 0 },
                { "type": "pointerUp", "button": 0 }
            ]
        }]))
        .await
    }

    async fn type_keys(&self, text: &str) -> TapFlowResult<()> {
        let mut actions = Vec::new();
        for ch in text.chars() {
            actions.push(json!({ "type": "keyDown", "value": ch.to_string() }));
            actions.push(json!({ "type": "keyUp", "value": ch.to_string() }));
        }
        self.perform_actions(json!([{
            "type": "key",
            "id": "keyboard",
            "actions": actions
        }]))
        .await
    }

    /// Waits a bounded interval for a page opened by the last click. If one
    /// appeared, rebinds the active handle to it and closes the previous
    /// window; otherwise execution proceeds on the existing page.
    async fn adopt_new_page(&self, known: &HashSet<String>) -> TapFlowResult<()> {
        let deadline = tokio::time::Instant::now() + NEW_PAGE_WINDOW;
        while tokio::time::Instant::now() < deadline {
            let opened = self
                .window_handles()
                .await?
                .into_iter()
                .find(|handle| !known.contains(handle));
            if let Some(new_handle) = opened {
                let mut active = self.active_handle.lock().await;
                tracing::info!(from = %*active, to = %new_handle, "click opened a new page");
                // Close the window we are still on, then switch.
                self.client
                    .delete(self.session_url("window"))
                    .send()
                    .await?
                    .error_for_status()?;
                self.post("window", json!({ "handle": new_handle })).await?;
                *active = new_handle;
                return Ok(());
            }
            tokio::time::sleep(NEW_PAGE_POLL).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Device for WebDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Web
    }

    fn size(&self) -> DeviceSize {
        self.size
    }

    async fn click(&self, x: i32, y: i32) -> TapFlowResult<()> {
        let known: HashSet<String> = self.window_handles().await?.into_iter().collect();
        self.pointer_click(x, y).await?;
        self.adopt_new_page(&known).await
    }

    async fn input_text(&self, x: i32, y: i32, text: &str, send_enter: bool) -> TapFlowResult<()> {
        self.pointer_click(x, y).await?;
        self.type_keys(text).await?;
        if send_enter {
            self.type_keys(&KEY_ENTER.to_string()).await?;
        }
        Ok(())
    }

    async fn swipe_between(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> TapFlowResult<()> {
        self.perform_actions(json!([{
            "type": "pointer",
            "id": "mouse",
            "parameters": { "pointerType": "mouse" },
            "actions": [
                { "type": "pointerMove", "duration": 0, "x": x1, "y": y1 },
                { "type": "pointerDown", "button": 0 },
                { "type": "pointerMove", "duration": 500, "x": x2, "y": y2 },
                { "type": "pointerUp", "button": 0 }
            ]
        }]))
        .await
    }

    async fn screenshot(&self) -> TapFlowResult<Vec<u8>> {
        let encoded: WdValue<String> = self.get_json("screenshot").await?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.value.as_bytes())
            .map_err(|e| device_error(format!("screenshot decode failed: {e}")))?;
        Ok(bytes)
    }

    async fn open_url(&self, url: &str) -> TapFlowResult<()> {
        self.post("url", json!({ "url": url })).await
    }

    async fn go_back(&self) -> TapFlowResult<()> {
        self.post("back", json!({})).await
    }

    async fn go_home(&self) -> TapFlowResult<()> {
        Err(device_error("go_home is not supported on the web backend"))
    }

    async fn list_installed_apps(&self) -> TapFlowResult<Vec<String>> {
        Err(device_error("app listing is not supported on the web backend"))
    }

    async fn launch_app(&self, _id: &str) -> TapFlowResult<()> {
        Err(device_error("app launch is not supported on the web backend"))
    }

    async fn close(&self) -> TapFlowResult<()> {
        self.client
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(session = %self.session_id, "webdriver session closed");
        Ok(())
    }
}
