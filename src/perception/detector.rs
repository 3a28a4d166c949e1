use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::VisionConfig;
use crate::errors::{TapFlowError, TapFlowResult};
use crate::perception::types::ScreenElement;

/// Result of one element-detection call: a labeled copy of the screenshot
/// plus the detected elements.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedScreen {
    #[serde(default, alias = "labeled_image_url")]
    pub image_url: String,
    #[serde(default, alias = "parsed_content_list")]
    pub elements: Vec<ScreenElement>,
}

/// Vision element-detection service seam. Fakes implement this in tests.
#[async_trait]
pub trait ElementDetector: Send + Sync {
    /// Detects UI elements on a screenshot. An empty element list is a hard
    /// failure, never silently accepted.
    async fn parse(&self, image: &[u8]) -> TapFlowResult<ParsedScreen>;
}

/// HTTP client for the omni-parse detection endpoint.
pub struct OmniDetector {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl OmniDetector {
    pub fn new(config: &VisionConfig) -> TapFlowResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: config.resolve_key(),
        })
    }
}

#[async_trait]
impl ElementDetector for OmniDetector {
    async fn parse(&self, image: &[u8]) -> TapFlowResult<ParsedScreen> {
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("screen.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("key", self.key.clone());

        let response = self
            .client
            .post(format!("{}/omni/parse/", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ParsedScreen = response.json().await?;
        tracing::info!(image_url = %parsed.image_url, elements = parsed.elements.len(), "screen parsed");
        if parsed.elements.is_empty() {
            return Err(TapFlowError::Perception(
                "screen parse returned no elements".into(),
            ));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_screen_accepts_service_field_names() {
        let parsed: ParsedScreen = serde_json::from_str(
            r#"{
                "labeled_image_url": "http://cos.local/a.png",
                "parsed_content_list": [
                    {"id": 0, "bbox": [0.1, 0.1, 0.2, 0.2], "content": "OK",
                     "left_elem_ids": [], "right_elem_ids": [1],
                     "top_elem_ids": [], "bottom_elem_ids": []}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.image_url, "http://cos.local/a.png");
        assert_eq!(parsed.elements[0].content, "OK");
        assert_eq!(parsed.elements[0].right_elem_ids, vec![1]);
    }
}
