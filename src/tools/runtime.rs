use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Settings;
use crate::context::{StepStatus, TaskContext};
use crate::device::{Device, SwipeDirection};
use crate::errors::{TapFlowError, TapFlowResult};
use crate::perception::{ElementDetector, OmniDetector, ScreenInfo};
use crate::storage::{HttpObjectStore, ObjectStore};
use crate::tools::params::{
    sanitize_params, AssertContainsParams, AssertNotContainsParams, ClickParams, InputParams,
    MarkFailedParams, OpenAppParams, OpenUrlParams, SwipeParams, SwipePointsParams, WaitParams,
};
use crate::tools::{delay_policy, ToolResult};

/// Hard ceiling on condition-driven repeats when no explicit bound is given.
const MAX_SWIPE_REPEATS: u32 = 50;
/// Settle interval after a gesture before re-parsing the screen.
const SETTLE_AFTER_SWIPE: Duration = Duration::from_secs(1);
/// Poll interval for wait-until-keyword.
const KEYWORD_POLL: Duration = Duration::from_secs(2);
/// Settle interval after launching an app or opening a deep link.
const SETTLE_AFTER_LAUNCH: Duration = Duration::from_secs(2);

/// Per-task tool runtime. The external planner drives it one tool at a time:
/// `begin_step` then `execute`; an `Err` return is always the uniform
/// retryable signal, a `ToolResult` with `is_success = false` is a structured
/// condition failure the planner can react to.
pub struct TaskRuntime {
    settings: Settings,
    device: Arc<dyn Device>,
    detector: Arc<dyn ElementDetector>,
    store: Arc<dyn ObjectStore>,
    context: TaskContext,
    /// Snapshot captured during the current tool call; attached to the step
    /// by the pipeline and reset before the next step.
    screen: ScreenInfo,
}

impl TaskRuntime {
    pub fn new(
        settings: Settings,
        device: Arc<dyn Device>,
        detector: Arc<dyn ElementDetector>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            settings,
            device,
            detector,
            store,
            context: TaskContext::new(),
            screen: ScreenInfo::default(),
        }
    }

    /// Builds the runtime with the production detector and object store.
    pub fn from_settings(settings: Settings, device: Arc<dyn Device>) -> TapFlowResult<Self> {
        let detector = Arc::new(OmniDetector::new(&settings.vision)?);
        let store = Arc::new(HttpObjectStore::new(&settings.storage));
        Ok(Self::new(settings, device, detector, store))
    }

    /// Opens (or re-enters) the step the next tool calls account against.
    pub fn begin_step(&mut self, step: u32, description: &str) {
        tracing::info!(step, description, "begin step");
        self.context.add_step(step, description);
    }

    /// Set by the driver when the planner emitted more than one tool call in
    /// a single reasoning turn.
    pub fn set_parallel_calls(&mut self, flag: bool) {
        self.context.parallel_tool_calls = flag;
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn into_context(self) -> TaskContext {
        self.context
    }

    pub fn screen(&self) -> &ScreenInfo {
        &self.screen
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one tool through the pipeline: single-flight guard, pre-handle,
    /// delays, execution, post-handle, error translation.
    pub async fn execute(&mut self, tool: &str, params: Value) -> TapFlowResult<ToolResult> {
        if self.context.parallel_tool_calls {
            tracing::warn!(tool, "rejected parallel tool call");
            return Err(TapFlowError::Retry("only use one tool at a time".into()));
        }
        self.context.parallel_tool_calls = true;
        let result = self.run_pipeline(tool, params).await;
        self.context.parallel_tool_calls = false;
        // The snapshot must not outlive the call that captured it, whether
        // the call succeeded or not.
        self.screen.reset();

        result.map_err(|error| {
            // Full detail stays local; the driving agent only sees a generic
            // retry nudge.
            tracing::error!(tool, error = %error, "tool execution failed");
            TapFlowError::Retry(format!("Error occurred, try calling '{tool}' again"))
        })
    }

    async fn run_pipeline(&mut self, tool: &str, params: Value) -> TapFlowResult<ToolResult> {
        self.context
            .update_current_step(tool, sanitize_params(&params));

        let (before, after) = delay_policy(tool);
        if before > 0 {
            tokio::time::sleep(Duration::from_secs(before)).await;
        }
        let result = self.dispatch(tool, params).await?;
        if after > 0 {
            tokio::time::sleep(Duration::from_secs(after)).await;
        }

        if let Some(step) = self.context.current_step_mut() {
            // mark_failed has already written its terminal outcome.
            if step.status != StepStatus::Failed {
                step.status = if result.is_success {
                    StepStatus::Succeeded
                } else {
                    StepStatus::Failed
                };
            }
        }
        Ok(result)
    }

    async fn dispatch(&mut self, tool: &str, params: Value) -> TapFlowResult<ToolResult> {
        match tool {
            "open_url" => {
                let params: OpenUrlParams = serde_json::from_value(params)?;
                self.device.open_url(&params.url).await?;
                tokio::time::sleep(SETTLE_AFTER_LAUNCH).await;
                self.capture_screen(false).await?;
                Ok(ToolResult::success())
            }
            "click" => {
                let params: ClickParams = serde_json::from_value(params)?;
                let (x, y) = params.coordinate(self.device.size());
                tracing::info!(x, y, content = %params.location.element_content, "click");
                self.device.click(x, y).await?;
                Ok(ToolResult::success())
            }
            "input" => {
                let params: InputParams = serde_json::from_value(params)?;
                let (x, y) = params.coordinate(self.device.size());
                tracing::info!(x, y, text = %params.text, "input");
                self.device
                    .input_text(x, y, &params.text, params.send_enter)
                    .await?;
                Ok(ToolResult::success())
            }
            "swipe" => {
                let params: SwipeParams = serde_json::from_value(params)?;
                self.tool_swipe(params).await
            }
            "swipe_from_coordinate" => {
                let params: SwipePointsParams = serde_json::from_value(params)?;
                for pair in params.coordinates.chunks_exact(2) {
                    let (x1, y1) = pair[0];
                    let (x2, y2) = pair[1];
                    tracing::info!(x1, y1, x2, y2, "swipe between coordinates");
                    self.device.swipe_between(x1, y1, x2, y2).await?;
                }
                Ok(ToolResult::success())
            }
            "go_back" => {
                self.device.go_back().await?;
                Ok(ToolResult::success())
            }
            "go_home" => {
                self.device.go_home().await?;
                Ok(ToolResult::success())
            }
            "open_app" => {
                let params: OpenAppParams = serde_json::from_value(params)?;
                tracing::info!(package = %params.package, "launch app");
                self.device.launch_app(&params.package).await?;
                tokio::time::sleep(SETTLE_AFTER_LAUNCH).await;
                self.capture_screen(false).await?;
                Ok(ToolResult::success())
            }
            "get_screen_info" => {
                let screen = self.capture_screen(true).await?;
                Ok(ToolResult::success_with(
                    json!({ "screen_elements": screen.elements }),
                ))
            }
            "wait" => {
                let params: WaitParams = serde_json::from_value(params)?;
                self.tool_wait(params).await
            }
            "assert_screen_contains" => {
                let params: AssertContainsParams = serde_json::from_value(params)?;
                self.expect_screen_contains(&params.expect_keywords).await
            }
            "assert_screen_not_contains" => {
                let params: AssertNotContainsParams = serde_json::from_value(params)?;
                self.expect_screen_not_contains(&params.unexpect_keywords)
                    .await
            }
            "mark_failed" => {
                let params: MarkFailedParams = serde_json::from_value(params)?;
                tracing::info!(reason = %params.reason, "task marked failed");
                self.context.set_step_failed(&params.reason);
                Ok(ToolResult::success())
            }
            "tear_down" => self.tool_tear_down().await,
            other => Err(TapFlowError::Device(format!("unknown tool: {other}"))),
        }
    }

    /// Swipes once, or repeatedly until the expected keywords appear. An
    /// exhausted bound is a structured failure, never an error.
    async fn tool_swipe(&mut self, params: SwipeParams) -> TapFlowResult<ToolResult> {
        let direction: SwipeDirection = params.to;
        let bound = params
            .repeat_times
            .unwrap_or(if params.expect_keywords.is_some() {
                MAX_SWIPE_REPEATS
            } else {
                1
            })
            .max(1);

        for attempt in 1..=bound {
            tracing::info!(to = ?direction, attempt, "swipe");
            self.device.swipe(direction).await?;
            if let Some(keywords) = &params.expect_keywords {
                tokio::time::sleep(SETTLE_AFTER_SWIPE).await;
                let (_, missing) = self.screen_keywords(keywords).await?;
                if missing.is_empty() {
                    return Ok(ToolResult::success());
                }
                if attempt == bound {
                    return Ok(ToolResult::failed().with_description(format!(
                        "keywords {missing:?} not found after {bound} swipes"
                    )));
                }
            }
        }
        Ok(ToolResult::success())
    }

    /// Plain sleep without keywords; otherwise polls the screen at a fixed
    /// interval until the keywords appear or the timeout elapses.
    async fn tool_wait(&mut self, params: WaitParams) -> TapFlowResult<ToolResult> {
        let timeout = Duration::from_secs(params.timeout);
        match &params.expect_keywords {
            None => {
                tracing::info!(secs = params.timeout, "wait");
                tokio::time::sleep(timeout).await;
                Ok(ToolResult::success())
            }
            Some(keywords) => {
                tracing::info!(secs = params.timeout, keywords = ?keywords, "wait for keywords");
                let deadline = tokio::time::Instant::now() + timeout;
                while tokio::time::Instant::now() < deadline {
                    let (_, missing) = self.screen_keywords(keywords).await?;
                    if missing.is_empty() {
                        return Ok(ToolResult::success());
                    }
                    tokio::time::sleep(KEYWORD_POLL).await;
                }
                Ok(ToolResult::failed()
                    .with_description(format!("keywords {keywords:?} did not appear within {}s", params.timeout)))
            }
        }
    }

    async fn tool_tear_down(&mut self) -> TapFlowResult<ToolResult> {
        if self.context.torn_down {
            tracing::warn!("tear_down already ran for this task");
            return Ok(ToolResult::success());
        }
        self.context.torn_down = true;
        // Final screenshot is uploaded but not vision-parsed.
        self.capture_screen(false).await?;
        self.device.close().await?;
        Ok(ToolResult::success())
    }

    /// Takes a screenshot and either runs element detection on it or only
    /// uploads it. The snapshot is recorded on the current step and kept as
    /// the transient working copy until the pipeline resets it.
    async fn capture_screen(&mut self, parse: bool) -> TapFlowResult<ScreenInfo> {
        let bytes = self.device.screenshot().await?;
        let screen = if parse {
            let parsed = self.detector.parse(&bytes).await?;
            if parsed.elements.is_empty() {
                return Err(TapFlowError::Perception(
                    "screen parse returned no elements".into(),
                ));
            }
            ScreenInfo { image_url: parsed.image_url, elements: parsed.elements }
        } else {
            let url = self.store.upload(&bytes, ".png").await?;
            ScreenInfo { image_url: url, elements: Vec::new() }
        };
        tracing::info!(image_url = %screen.image_url, elements = screen.elements.len(), "screen captured");

        if let Some(step) = self.context.current_step_mut() {
            step.image_url = screen.image_url.clone();
            step.screen_elements = screen.elements.clone();
        }
        self.screen = screen.clone();
        Ok(screen)
    }

    /// Splits `keywords` into (present, missing) against the serialized
    /// element descriptions of a fresh screen parse.
    async fn screen_keywords(
        &mut self,
        keywords: &[String],
    ) -> TapFlowResult<(Vec<String>, Vec<String>)> {
        let screen = self.capture_screen(true).await?;
        let text = screen.elements_text();
        let (present, missing) = keywords
            .iter()
            .cloned()
            .partition(|keyword| text.contains(keyword.as_str()));
        Ok((present, missing))
    }

    async fn expect_screen_contains(&mut self, keywords: &[String]) -> TapFlowResult<ToolResult> {
        let (_, missing) = self.screen_keywords(keywords).await?;
        if missing.is_empty() {
            Ok(ToolResult::success())
        } else {
            tracing::warn!(missing = ?missing, "screen does not contain expected keywords");
            Ok(ToolResult::failed()
                .with_description(format!("screen does not contain expected keywords: {missing:?}")))
        }
    }

    async fn expect_screen_not_contains(
        &mut self,
        keywords: &[String],
    ) -> TapFlowResult<ToolResult> {
        let (present, _) = self.screen_keywords(keywords).await?;
        if present.is_empty() {
            Ok(ToolResult::success())
        } else {
            tracing::warn!(present = ?present, "screen contains unexpected keywords");
            Ok(ToolResult::failed()
                .with_description(format!("screen contains unexpected keywords: {present:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::config::{DeviceConfig, StorageConfig, VisionConfig};
    use crate::device::{DeviceKind, DeviceSize};
    use crate::perception::{ParsedScreen, ScreenElement};

    /// Shared scripted backend state, observed by the fake device and the
    /// fake detector alike.
    #[derive(Default)]
    struct Fixture {
        swipes: AtomicU32,
        clicks: AtomicU32,
        closes: AtomicU32,
        fail_clicks: bool,
        /// Swipes error out once this many have already happened.
        fail_swipes_after: Option<u32>,
        /// The fake detector reports the keyword once this many swipes have
        /// happened. u32::MAX means never.
        keyword_after: u32,
    }

    struct FakeDevice(Arc<Fixture>);

    #[async_trait]
    impl Device for FakeDevice {
        fn kind(&self) -> DeviceKind {
            DeviceKind::Android
        }

        fn size(&self) -> DeviceSize {
            DeviceSize { width: 1000, height: 2000 }
        }

        async fn click(&self, _x: i32, _y: i32) -> TapFlowResult<()> {
            if self.0.fail_clicks {
                return Err(TapFlowError::Device("injected click failure".into()));
            }
            self.0.clicks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn input_text(
            &self,
            _x: i32,
            _y: i32,
            _text: &str,
            _send_enter: bool,
        ) -> TapFlowResult<()> {
            Ok(())
        }

        async fn swipe_between(&self, _x1: i32, _y1: i32, _x2: i32, _y2: i32) -> TapFlowResult<()> {
            let done = self.0.swipes.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_swipes_after.is_some_and(|n| done >= n) {
                return Err(TapFlowError::Device("injected swipe failure".into()));
            }
            Ok(())
        }

        async fn screenshot(&self) -> TapFlowResult<Vec<u8>> {
            Ok(vec![0x89, 0x50, 0x4e, 0x47])
        }

        async fn open_url(&self, _url: &str) -> TapFlowResult<()> {
            Ok(())
        }

        async fn go_back(&self) -> TapFlowResult<()> {
            Ok(())
        }

        async fn go_home(&self) -> TapFlowResult<()> {
            Ok(())
        }

        async fn list_installed_apps(&self) -> TapFlowResult<Vec<String>> {
            Ok(vec!["com.example.music".into()])
        }

        async fn launch_app(&self, _id: &str) -> TapFlowResult<()> {
            Ok(())
        }

        async fn close(&self) -> TapFlowResult<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeDetector {
        fixture: Arc<Fixture>,
        keyword: &'static str,
    }

    #[async_trait]
    impl ElementDetector for FakeDetector {
        async fn parse(&self, _image: &[u8]) -> TapFlowResult<ParsedScreen> {
            let content = if self.fixture.swipes.load(Ordering::SeqCst) >= self.fixture.keyword_after
            {
                self.keyword
            } else {
                "nothing of interest"
            };
            Ok(ParsedScreen {
                image_url: "http://omni.test/labeled.png".into(),
                elements: vec![ScreenElement {
                    id: 0,
                    bbox: [0.1, 0.1, 0.3, 0.2],
                    content: content.into(),
                    left_elem_ids: vec![],
                    right_elem_ids: vec![],
                    top_elem_ids: vec![],
                    bottom_elem_ids: vec![],
                }],
            })
        }
    }

    struct FakeStore;

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn upload(&self, _bytes: &[u8], suffix: &str) -> TapFlowResult<String> {
            Ok(format!("http://store.test/shot{suffix}"))
        }
    }

    fn test_settings() -> Settings {
        Settings {
            vision: VisionConfig {
                base_url: "http://omni.test".into(),
                key: None,
                timeout_secs: 120,
            },
            storage: StorageConfig {
                endpoint: "http://store.test".into(),
                bucket: "shots".into(),
                public_base: None,
            },
            device: DeviceConfig::default(),
        }
    }

    fn runtime_with(fixture: Arc<Fixture>) -> TaskRuntime {
        TaskRuntime::new(
            test_settings(),
            Arc::new(FakeDevice(fixture.clone())),
            Arc::new(FakeDetector { fixture, keyword: "Playlist" }),
            Arc::new(FakeStore),
        )
    }

    fn click_params() -> Value {
        json!({
            "element_bbox": [0.2, 0.2, 0.4, 0.4],
            "element_content": "OK"
        })
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_call_is_rejected_without_ledger_mutation() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture.clone());
        runtime.begin_step(1, "click the OK button");
        runtime.set_parallel_calls(true);

        let err = runtime.execute("click", click_params()).await.unwrap_err();
        assert!(matches!(&err, TapFlowError::Retry(msg) if msg == "only use one tool at a time"));

        let step = runtime.context().current_step().unwrap();
        assert_eq!(step.action, "");
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(fixture.clicks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn click_records_sanitized_params_and_outcome() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture.clone());
        runtime.begin_step(1, "click the OK button");

        let result = runtime
            .execute(
                "click",
                json!({
                    "action": "click",
                    "instruction": "click the OK button",
                    "element_bbox": [0.2, 0.2, 0.4, 0.4],
                    "element_content": "OK",
                    "position": null
                }),
            )
            .await
            .unwrap();
        assert!(result.is_success);
        assert_eq!(fixture.clicks.load(Ordering::SeqCst), 1);

        let step = runtime.context().current_step().unwrap();
        assert_eq!(step.action, "click");
        assert_eq!(step.status, StepStatus::Succeeded);
        assert!(!step.params.contains_key("action"));
        assert!(!step.params.contains_key("instruction"));
        assert!(!step.params.contains_key("position"));
        assert!(step.params.contains_key("element_bbox"));
    }

    #[tokio::test(start_paused = true)]
    async fn swipe_until_keyword_succeeds_on_third_attempt() {
        let fixture = Arc::new(Fixture { keyword_after: 3, ..Fixture::default() });
        let mut runtime = runtime_with(fixture.clone());
        runtime.begin_step(1, "swipe until the playlist shows");

        let result = runtime
            .execute("swipe", json!({ "to": "top", "expect_keywords": ["Playlist"] }))
            .await
            .unwrap();
        assert!(result.is_success);
        assert_eq!(fixture.swipes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn swipe_exhaustion_is_structured_failure() {
        let fixture = Arc::new(Fixture { keyword_after: u32::MAX, ..Fixture::default() });
        let mut runtime = runtime_with(fixture.clone());
        runtime.begin_step(1, "swipe looking for something missing");

        let result = runtime
            .execute(
                "swipe",
                json!({ "to": "top", "expect_keywords": ["Playlist"], "repeat_times": 4 }),
            )
            .await
            .unwrap();
        assert!(!result.is_success);
        assert_eq!(fixture.swipes.load(Ordering::SeqCst), 4);
        assert_eq!(
            runtime.context().current_step().unwrap().status,
            StepStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn swipe_without_keywords_is_single_gesture() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture.clone());
        runtime.begin_step(1, "swipe down once");

        let result = runtime.execute("swipe", json!({ "to": "bottom" })).await.unwrap();
        assert!(result.is_success);
        assert_eq!(fixture.swipes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tool_error_becomes_uniform_retry_signal() {
        let fixture = Arc::new(Fixture { fail_clicks: true, ..Fixture::default() });
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "click something broken");

        let err = runtime.execute("click", click_params()).await.unwrap_err();
        assert!(
            matches!(&err, TapFlowError::Retry(msg) if msg == "Error occurred, try calling 'click' again")
        );
        // The step outcome stays unresolved rather than being marked
        // successful.
        assert_eq!(
            runtime.context().current_step().unwrap().status,
            StepStatus::Running
        );
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_cleared_after_tool_error() {
        let fixture = Arc::new(Fixture {
            keyword_after: u32::MAX,
            fail_swipes_after: Some(1),
            ..Fixture::default()
        });
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "swipe looking for the playlist");

        // First swipe captures a screen for the keyword check; the second
        // swipe errors inside the pipeline.
        let err = runtime
            .execute("swipe", json!({ "to": "top", "expect_keywords": ["Playlist"] }))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(runtime.screen().is_empty());

        runtime.begin_step(2, "inspect the screen");
        assert!(runtime.screen().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_attached_to_step_then_cleared() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "inspect the screen");

        let result = runtime.execute("get_screen_info", json!({})).await.unwrap();
        assert!(result.is_success);
        assert!(result.output.is_some());

        let step = runtime.context().current_step().unwrap();
        assert_eq!(step.image_url, "http://omni.test/labeled.png");
        assert_eq!(step.screen_elements.len(), 1);
        // The transient working copy does not survive past the pipeline.
        assert!(runtime.screen().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mark_failed_is_terminal_and_sticks() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(2, "give up on a missing element");

        let result = runtime
            .execute("mark_failed", json!({ "reason": "element not actionable" }))
            .await
            .unwrap();
        assert!(result.is_success);

        let step = runtime.context().current_step().unwrap();
        assert_eq!(step.action, "mark_failed");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.params["reason"], "element not actionable");
        assert!(runtime.context().has_failed_step());
    }

    #[tokio::test(start_paused = true)]
    async fn tear_down_releases_device_exactly_once() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture.clone());
        runtime.begin_step(9, "clean up");

        let first = runtime.execute("tear_down", json!({})).await.unwrap();
        let second = runtime.execute("tear_down", json!({})).await.unwrap();
        assert!(first.is_success && second.is_success);
        assert_eq!(fixture.closes.load(Ordering::SeqCst), 1);

        let last = runtime.context().steps().last().unwrap();
        assert_eq!(last.action, "tear_down");
        // Uploaded but not vision-parsed.
        assert_eq!(last.image_url, "http://store.test/shot.png");
        assert!(last.screen_elements.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_with_keywords_times_out_as_failure() {
        let fixture = Arc::new(Fixture { keyword_after: u32::MAX, ..Fixture::default() });
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "wait for the playlist");

        let result = runtime
            .execute("wait", json!({ "timeout": 5, "expect_keywords": ["Playlist"] }))
            .await
            .unwrap();
        assert!(!result.is_success);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_without_keywords_just_sleeps() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "wait two seconds");

        let result = runtime.execute("wait", json!({ "timeout": 2 })).await.unwrap();
        assert!(result.is_success);
    }

    #[tokio::test(start_paused = true)]
    async fn assert_contains_reports_missing_keywords() {
        let fixture = Arc::new(Fixture { keyword_after: u32::MAX, ..Fixture::default() });
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "check the screen");

        let result = runtime
            .execute(
                "assert_screen_contains",
                json!({ "expect_keywords": ["nothing of interest", "Checkout"] }),
            )
            .await
            .unwrap();
        assert!(!result.is_success);
        assert!(result.description.unwrap().contains("Checkout"));
    }

    #[tokio::test(start_paused = true)]
    async fn assert_not_contains_reports_present_keywords() {
        let fixture = Arc::new(Fixture { keyword_after: u32::MAX, ..Fixture::default() });
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "check the screen");

        let result = runtime
            .execute(
                "assert_screen_not_contains",
                json!({ "unexpect_keywords": ["nothing of interest"] }),
            )
            .await
            .unwrap();
        assert!(!result.is_success);
        assert!(result.description.unwrap().contains("nothing of interest"));
    }

    #[tokio::test(start_paused = true)]
    async fn open_url_uploads_unparsed_screen() {
        let fixture = Arc::new(Fixture::default());
        let mut runtime = runtime_with(fixture);
        runtime.begin_step(1, "open the home page");

        let result = runtime
            .execute("open_url", json!({ "url": "https://example.com" }))
            .await
            .unwrap();
        assert!(result.is_success);

        let step = runtime.context().current_step().unwrap();
        assert_eq!(step.image_url, "http://store.test/shot.png");
        assert!(step.screen_elements.is_empty());
        assert_eq!(step.status, StepStatus::Succeeded);
    }
}
