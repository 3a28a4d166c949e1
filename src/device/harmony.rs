use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::config::Settings;
use crate::device::{apply_deeplink, device_error, Device, DeviceKind, DeviceSize};
use crate::errors::TapFlowResult;

const REMOTE_SNAPSHOT: &str = "/data/local/tmp/tapflow_screen.jpeg";

/// HarmonyOS backend driving the device through hdc shell / uitest commands.
pub struct HarmonyDevice {
    connect_key: Option<String>,
    size: DeviceSize,
    render_pattern: Regex,
    physical_pattern: Regex,
    deeplink_template: Option<String>,
}

impl HarmonyDevice {
    pub async fn create(settings: &Settings) -> TapFlowResult<Self> {
        let (render_pattern, physical_pattern) = resolution_patterns()?;
        let mut device = Self {
            connect_key: settings.device.hdc_connect_key.clone(),
            size: DeviceSize { width: 0, height: 0 },
            render_pattern,
            physical_pattern,
            deeplink_template: settings.device.deeplink_template.clone(),
        };
        device.size = device.query_size().await?;
        Ok(device)
    }

    async fn hdc(&self, args: &[&str]) -> TapFlowResult<String> {
        let mut command = Command::new("hdc");
        if let Some(key) = &self.connect_key {
            command.args(["-t", key]);
        }
        command.args(args);
        let output = command.output().await?;
        if !output.status.success() {
            return Err(device_error(format!(
                "hdc {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn shell(&self, args: &[&str]) -> TapFlowResult<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        self.hdc(&full).await
    }

    async fn ui_input(&self, args: &[&str]) -> TapFlowResult<()> {
        let mut full = vec!["uitest", "uiInput"];
        full.extend_from_slice(args);
        let output = self.shell(&full).await?;
        if output.contains("No Error") {
            Ok(())
        } else {
            Err(device_error(format!("uitest uiInput failed: {}", output.trim())))
        }
    }

    async fn query_size(&self) -> TapFlowResult<DeviceSize> {
        let output = self
            .shell(&["hidumper", "-s", "RenderService", "-a", "screen"])
            .await?;
        parse_resolution(&self.render_pattern, &self.physical_pattern, &output)
            .ok_or_else(|| device_error(format!("unexpected resolution output: {output}")))
    }
}

fn resolution_patterns() -> TapFlowResult<(Regex, Regex)> {
    let compile = |pattern: &str| {
        Regex::new(pattern).map_err(|e| device_error(format!("resolution pattern: {e}")))
    };
    Ok((
        compile(r"render resolution=(\d+)x(\d+)")?,
        compile(r"physical resolution=(\d+)x(\d+)")?,
    ))
}

/// Render resolution is what uiInput coordinates are expressed in; physical
/// resolution is the fallback for older dumps.
fn parse_resolution(render: &Regex, physical: &Regex, output: &str) -> Option<DeviceSize> {
    let caps = render.captures(output).or_else(|| physical.captures(output))?;
    Some(DeviceSize {
        width: caps[1].parse().ok()?,
        height: caps[2].parse().ok()?,
    })
}

#[async_trait]
impl Device for HarmonyDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Harmony
    }

    fn size(&self) -> DeviceSize {
        self.size
    }

    async fn click(&self, x: i32, y: i32) -> TapFlowResult<()> {
        self.ui_input(&["click", &x.to_string(), &y.to_string()]).await
    }

    async fn input_text(&self, x: i32, y: i32, text: &str, send_enter: bool) -> TapFlowResult<()> {
        self.ui_input(&["inputText", &x.to_string(), &y.to_string(), text])
            .await?;
        if send_enter {
            // 2054 is the HarmonyOS keycode for Enter.
            self.ui_input(&["keyEvent", "2054"]).await?;
        }
        Ok(())
    }

    async fn swipe_between(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> TapFlowResult<()> {
        self.ui_input(&[
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            "600",
        ])
        .await
    }

    async fn screenshot(&self) -> TapFlowResult<Vec<u8>> {
        let output = self
            .shell(&["snapshot_display", "-f", REMOTE_SNAPSHOT])
            .await?;
        if !output.contains("success") {
            return Err(device_error(format!("snapshot_display failed: {}", output.trim())));
        }
        let local = std::env::temp_dir().join(format!("tapflow_{}.jpeg", uuid::Uuid::new_v4()));
        let local_str = local.to_string_lossy().into_owned();
        self.hdc(&["file", "recv", REMOTE_SNAPSHOT, &local_str]).await?;
        let bytes = tokio::fs::read(&local).await?;
        let _ = tokio::fs::remove_file(&local).await;
        Ok(bytes)
    }

    async fn open_url(&self, url: &str) -> TapFlowResult<()> {
        let target = apply_deeplink(self.deeplink_template.as_deref(), url);
        tracing::info!(target = %target, "open url via want");
        self.shell(&["aa", "start", "-A", "ohos.want.action.viewData", "-U", &target])
            .await?;
        Ok(())
    }

    async fn go_back(&self) -> TapFlowResult<()> {
        self.ui_input(&["keyEvent", "Back"]).await
    }

    async fn go_home(&self) -> TapFlowResult<()> {
        self.ui_input(&["keyEvent", "Home"]).await
    }

    async fn list_installed_apps(&self) -> TapFlowResult<Vec<String>> {
        let output = self.shell(&["bm", "dump", "-a"]).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("ID:"))
            .map(str::to_string)
            .collect())
    }

    async fn launch_app(&self, id: &str) -> TapFlowResult<()> {
        self.shell(&["aa", "start", "-b", id, "-a", "EntryAbility"]).await?;
        Ok(())
    }

    async fn close(&self) -> TapFlowResult<()> {
        // hdc sessions are stateless; nothing to release.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parsing_prefers_render() {
        let (render, physical) = resolution_patterns().unwrap();
        let dump = "physical resolution=1260x2720\nrender resolution=1008x2176\n";
        assert_eq!(
            parse_resolution(&render, &physical, dump),
            Some(DeviceSize { width: 1008, height: 2176 })
        );

        let physical_only = "physical resolution=1260x2720\n";
        assert_eq!(
            parse_resolution(&render, &physical, physical_only),
            Some(DeviceSize { width: 1260, height: 2720 })
        );
        assert_eq!(parse_resolution(&render, &physical, "garbage"), None);
    }
}
