use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::{DeviceSize, SwipeDirection};

/// Sub-position of a bounding box to bias a click toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Left,
    Right,
    Top,
    Bottom,
}

const DEFAULT_OFFSET: f32 = 0.25;

/// Maps a relative bounding box to a pixel coordinate. Starts from the box
/// centroid; a `position` biases the corresponding axis toward the named edge
/// by `offset` of the box's extent on that axis. No clamping; callers supply
/// in-range boxes.
pub fn resolve_coordinate(
    bbox: [f32; 4],
    size: DeviceSize,
    position: Option<Position>,
    offset: Option<f32>,
) -> (i32, i32) {
    let [x1, y1, x2, y2] = bbox;
    let mut x = (x1 + x2) / 2.0;
    let mut y = (y1 + y2) / 2.0;
    let offset = offset.unwrap_or(DEFAULT_OFFSET);
    match position {
        Some(Position::Left) => x = x1 + (x2 - x1) * offset,
        Some(Position::Right) => x = x2 - (x2 - x1) * offset,
        Some(Position::Top) => y = y1 + (y2 - y1) * offset,
        Some(Position::Bottom) => y = y2 - (y2 - y1) * offset,
        None => {}
    }
    (
        (x * size.width as f32).round() as i32,
        (y * size.height as f32).round() as i32,
    )
}

/// Shared fields of element-targeting tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationParams {
    pub element_bbox: [f32; 4],
    #[serde(default)]
    pub element_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickParams {
    #[serde(flatten)]
    pub location: LocationParams,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub offset: Option<f32>,
}

impl ClickParams {
    pub fn coordinate(&self, size: DeviceSize) -> (i32, i32) {
        resolve_coordinate(self.location.element_bbox, size, self.position, self.offset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputParams {
    #[serde(flatten)]
    pub location: LocationParams,
    pub text: String,
    #[serde(default = "default_true")]
    pub send_enter: bool,
}

impl InputParams {
    pub fn coordinate(&self, size: DeviceSize) -> (i32, i32) {
        resolve_coordinate(self.location.element_bbox, size, None, None)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenUrlParams {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeParams {
    pub to: SwipeDirection,
    #[serde(default)]
    pub expect_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub repeat_times: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipePointsParams {
    /// Consecutive (start, end) coordinate pairs; a trailing unpaired point
    /// is ignored.
    pub coordinates: Vec<(i32, i32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitParams {
    /// Seconds.
    pub timeout: u64,
    #[serde(default)]
    pub expect_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertContainsParams {
    pub expect_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertNotContainsParams {
    pub unexpect_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAppParams {
    /// Package / bundle identifier resolved by the planner from the
    /// installed-apps list.
    pub package: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkFailedParams {
    pub reason: String,
}

/// Strips bookkeeping keys and empty values from raw tool parameters before
/// they are written into the step ledger.
pub(crate) fn sanitize_params(params: &Value) -> Map<String, Value> {
    let mut sanitized = Map::new();
    if let Value::Object(map) = params {
        for (key, value) in map {
            if key == "action" || key == "instruction" {
                continue;
            }
            let empty = match value {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                _ => false,
            };
            if !empty {
                sanitized.insert(key.clone(), value.clone());
            }
        }
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIZE: DeviceSize = DeviceSize { width: 1000, height: 1000 };
    const BBOX: [f32; 4] = [0.2, 0.2, 0.4, 0.4];

    #[test]
    fn resolver_centroid() {
        assert_eq!(resolve_coordinate(BBOX, SIZE, None, None), (300, 300));
    }

    #[test]
    fn resolver_left_bias_default_offset() {
        // x = 0.2 + 0.2 * 0.25 = 0.25
        assert_eq!(
            resolve_coordinate(BBOX, SIZE, Some(Position::Left), None),
            (250, 300)
        );
    }

    #[test]
    fn resolver_half_offset_is_centroid() {
        assert_eq!(
            resolve_coordinate(BBOX, SIZE, Some(Position::Left), Some(0.5)),
            (300, 300)
        );
    }

    #[test]
    fn resolver_bottom_bias() {
        // y = 0.4 - 0.2 * 0.25 = 0.35
        assert_eq!(
            resolve_coordinate(BBOX, SIZE, Some(Position::Bottom), None),
            (300, 350)
        );
    }

    #[test]
    fn click_params_accept_flat_shape() {
        let params: ClickParams = serde_json::from_value(json!({
            "element_bbox": [0.2, 0.2, 0.4, 0.4],
            "element_content": "OK",
            "position": "right"
        }))
        .unwrap();
        assert_eq!(params.coordinate(SIZE), (350, 300));
    }

    #[test]
    fn sanitize_drops_bookkeeping_and_empty_values() {
        let sanitized = sanitize_params(&json!({
            "action": "click",
            "instruction": "click the OK button",
            "element_bbox": [0.2, 0.2, 0.4, 0.4],
            "element_content": "",
            "position": null,
            "expect_keywords": []
        }));
        assert_eq!(sanitized.len(), 1);
        assert!(sanitized.contains_key("element_bbox"));
    }
}
