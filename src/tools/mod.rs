pub mod params;
pub mod runtime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use params::{
    AssertContainsParams, AssertNotContainsParams, ClickParams, InputParams, MarkFailedParams,
    OpenAppParams, OpenUrlParams, Position, SwipeParams, SwipePointsParams, WaitParams,
};
pub use runtime::TaskRuntime;

/// Outcome of one tool invocation. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub is_success: bool,
    pub output: Option<Value>,
    pub description: Option<String>,
}

impl ToolResult {
    pub fn success() -> Self {
        Self { is_success: true, output: None, description: None }
    }

    pub fn success_with(output: Value) -> Self {
        Self { is_success: true, output: Some(output), description: None }
    }

    pub fn failed() -> Self {
        Self { is_success: false, output: None, description: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Static per-tool settle delays in seconds (pre, post). The pre-delay lets
/// the UI settle before assertion-type calls; the post-delay compensates for
/// asynchronous rendering after an action.
pub(crate) fn delay_policy(tool: &str) -> (u64, u64) {
    match tool {
        "assert_screen_contains" | "assert_screen_not_contains" => (2, 0),
        "open_url" | "click" => (0, 2),
        "input" | "swipe" | "go_back" => (0, 1),
        _ => (0, 0),
    }
}
