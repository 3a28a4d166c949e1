use serde::{Deserialize, Serialize};

/// One detected UI element. `bbox` is a normalized rectangle
/// [x1, y1, x2, y2] in range 0.0–1.0 with x1≤x2, y1≤y2. The neighbor id
/// lists are ordered nearest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenElement {
    pub id: u32,
    pub bbox: [f32; 4],
    pub content: String,
    #[serde(default)]
    pub left_elem_ids: Vec<u32>,
    #[serde(default)]
    pub right_elem_ids: Vec<u32>,
    #[serde(default)]
    pub top_elem_ids: Vec<u32>,
    #[serde(default)]
    pub bottom_elem_ids: Vec<u32>,
}

/// Screen snapshot captured per tool call: an image reference plus the
/// detected elements. Attached to the current step and then reset; it never
/// survives into the next step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub image_url: String,
    pub elements: Vec<ScreenElement>,
}

impl ScreenInfo {
    pub fn reset(&mut self) {
        self.image_url.clear();
        self.elements.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.image_url.is_empty() && self.elements.is_empty()
    }

    /// Serialized element descriptions, used for keyword matching.
    pub fn elements_text(&self) -> String {
        serde_json::to_string(&self.elements).unwrap_or_default()
    }
}
