use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::device::{apply_deeplink, device_error, Device, DeviceKind, DeviceSize};
use crate::errors::TapFlowResult;

#[derive(Debug, Deserialize)]
struct WdaValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct WdaSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WdaSize {
    width: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
struct WdaApp {
    #[serde(rename = "bundleId")]
    bundle_id: String,
}

/// iOS backend over the WebDriverAgent HTTP API.
pub struct IosDevice {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    size: DeviceSize,
    deeplink_template: Option<String>,
}

impl IosDevice {
    pub async fn create(settings: &Settings) -> TapFlowResult<Self> {
        let base_url = settings
            .device
            .wda_url
            .clone()
            .ok_or_else(|| device_error("device.wda_url is not configured"))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        // A reachable /status is the minimum bar for a usable agent.
        client
            .get(format!("{base_url}/status"))
            .send()
            .await?
            .error_for_status()?;

        let session: WdaValue<WdaSession> = client
            .post(format!("{base_url}/session"))
            .json(&json!({ "capabilities": {} }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let session_id = session.value.session_id;

        let size: WdaValue<WdaSize> = client
            .get(format!("{base_url}/session/{session_id}/window/size"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(session = %session_id, "connected to WebDriverAgent");
        Ok(Self {
            client,
            base_url,
            session_id,
            size: DeviceSize {
                width: size.value.width as u32,
                height: size.value.height as u32,
            },
            deeplink_template: settings.device.deeplink_template.clone(),
        })
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
}

#[async_trait]
impl Device for IosDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Ios
    }

    fn size(&self) -> DeviceSize {
        self.size
    }

    async fn click(&self, x: i32, y: i32) -> TapFlowResult<()> {
        self.post("wda/tap", json!({ "x": x, "y": y })).await
    }

    async fn input_text(&self, x: i32, y: i32, text: &str, send_enter: bool) -> TapFlowResult<()> {
        self.click(x, y).await?;
        let mut value = text.to_string();
        if send_enter {
            value.push('\n');
        }
        self.post("wda/keys", json!({ "value": [value] })).await
    }

    async fn swipe_between(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> TapFlowResult<()> {
        self.post(
            "wda/dragfromtoforduration",
            json!({
                "fromX": x1, "fromY": y1,
                "toX": x2, "toY": y2,
                "duration": 2.0
            }),
        )
        .await
    }

    async fn screenshot(&self) -> TapFlowResult<Vec<u8>> {
        let encoded: WdaValue<String> = self
            .client
            .get(format!("{}/screenshot", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.value.as_bytes())
            .map_err(|e| device_error(format!("screenshot decode failed: {e}")))
    }

    async fn open_url(&self, url: &str) -> TapFlowResult<()> {
        let target = apply_deeplink(self.deeplink_template.as_deref(), url);
        tracing::info!(target = %target, "open url via wda");
        self.post("url", json!({ "url": target })).await
    }

    async fn go_back(&self) -> TapFlowResult<()> {
        // iOS has no hardware back; use the system edge-swipe gesture.
        let width = self.size.width as i32;
        let mid_y = (self.size.height / 2) as i32;
        self.swipe_between(0, mid_y, width / 2, mid_y).await
    }

    async fn go_home(&self) -> TapFlowResult<()> {
        self.client
            .post(format!("{}/wda/homescreen", self.base_url))
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn list_installed_apps(&self) -> TapFlowResult<Vec<String>> {
        let apps: WdaValue<Vec<WdaApp>> = self
            .client
            .get(self.session_url("wda/apps/list"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(apps.value.into_iter().map(|app| app.bundle_id).collect())
    }

    async fn launch_app(&self, id: &str) -> TapFlowResult<()> {
        self.post("wda/apps/launch", json!({ "bundleId": id })).await
    }

    async fn close(&self) -> TapFlowResult<()> {
        self.client
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(session = %self.session_id, "wda session closed");
        Ok(())
    }
}
