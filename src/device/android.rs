use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::config::Settings;
use crate::device::{apply_deeplink, device_error, Device, DeviceKind, DeviceSize};
use crate::errors::TapFlowResult;

/// Android backend driving the device through adb shell commands.
pub struct AndroidDevice {
    serial: Option<String>,
    size: DeviceSize,
    size_pattern: Regex,
    deeplink_template: Option<String>,
}

impl AndroidDevice {
    pub async fn create(settings: &Settings) -> TapFlowResult<Self> {
        let serial = settings.device.adb_serial.clone();
        let mut device = Self {
            serial,
            size: DeviceSize { width: 0, height: 0 },
            size_pattern: wm_size_pattern()?,
            deeplink_template: settings.device.deeplink_template.clone(),
        };
        device.size = device.query_size().await?;
        Ok(device)
    }

    async fn adb(&self, args: &[&str]) -> TapFlowResult<Vec<u8>> {
        let mut command = Command::new("adb");
        if let Some(serial) = &self.serial {
            command.args(["-s", serial]);
        }
        command.args(args);
        let output = command.output().await?;
        if !output.status.success() {
            return Err(device_error(format!(
                "adb {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn shell(&self, args: &[&str]) -> TapFlowResult<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        let stdout = self.adb(&full).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn query_size(&self) -> TapFlowResult<DeviceSize> {
        let output = self.shell(&["wm", "size"]).await?;
        parse_wm_size(&self.size_pattern, &output)
            .ok_or_else(|| device_error(format!("unexpected wm size output: {output}")))
    }
}

fn wm_size_pattern() -> TapFlowResult<Regex> {
    Regex::new(r"(\d+)x(\d+)").map_err(|e| device_error(format!("size pattern: {e}")))
}

fn parse_wm_size(pattern: &Regex, output: &str) -> Option<DeviceSize> {
    let caps = pattern.captures(output)?;
    Some(DeviceSize {
        width: caps[1].parse().ok()?,
        height: caps[2].parse().ok()?,
    })
}

/// `input text` treats spaces as argument separators; adb convention is %s.
fn escape_input_text(text: &str) -> String {
    text.replace(' ', "%s").replace(['"', '\'', '&', '$'], "")
}

#[async_trait]
impl Device for AndroidDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Android
    }

    fn size(&self) -> DeviceSize {
        self.size
    }

    async fn click(&self, x: i32, y: i32) -> TapFlowResult<()> {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await?;
        Ok(())
    }

    async fn input_text(&self, x: i32, y: i32, text: &str, send_enter: bool) -> TapFlowResult<()> {
        self.click(x, y).await?;
        let escaped = escape_input_text(text);
        self.shell(&["input", "text", &escaped]).await?;
        if send_enter {
            self.shell(&["input", "keyevent", "KEYCODE_ENTER"]).await?;
        }
        Ok(())
    }

    async fn swipe_between(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> TapFlowResult<()> {
        self.shell(&[
            "input",
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            "2000",
        ])
        .await?;
        Ok(())
    }

    async fn screenshot(&self) -> TapFlowResult<Vec<u8>> {
        self.adb(&["exec-out", "screencap", "-p"]).await
    }

    async fn open_url(&self, url: &str) -> TapFlowResult<()> {
        let target = apply_deeplink(self.deeplink_template.as_deref(), url);
        tracing::info!(target = %target, "open url via intent");
        self.shell(&[
            "am",
            "start",
            "-a",
            "android.intent.action.VIEW",
            "-d",
            &target,
        ])
        .await?;
        Ok(())
    }

    async fn go_back(&self) -> TapFlowResult<()> {
        self.shell(&["input", "keyevent", "KEYCODE_BACK"]).await?;
        Ok(())
    }

    async fn go_home(&self) -> TapFlowResult<()> {
        self.shell(&["input", "keyevent", "KEYCODE_HOME"]).await?;
        Ok(())
    }

    async fn list_installed_apps(&self) -> TapFlowResult<Vec<String>> {
        let output = self.shell(&["pm", "list", "packages", "-e"]).await?;
        Ok(output
            .lines()
            .filter_map(|line| line.strip_prefix("package:"))
            .map(|pkg| pkg.trim().to_string())
            .collect())
    }

    async fn launch_app(&self, id: &str) -> TapFlowResult<()> {
        self.shell(&[
            "monkey",
            "-p",
            id,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;
        Ok(())
    }

    async fn close(&self) -> TapFlowResult<()> {
        // adb sessions are stateless; nothing to release.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_text_escaping() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text("a\"b'c&d$e"), "abcde");
    }

    #[test]
    fn wm_size_parsing() {
        let pattern = wm_size_pattern().unwrap();
        assert_eq!(
            parse_wm_size(&pattern, "Physical size: 1080x2400\n"),
            Some(DeviceSize { width: 1080, height: 2400 })
        );
        assert_eq!(parse_wm_size(&pattern, "garbage"), None);
    }
}
