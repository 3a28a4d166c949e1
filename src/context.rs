use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::perception::ScreenElement;

/// Outcome state machine for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Bookkeeping record for one atomic UI action, identified by a
/// caller-assigned index. Mutated only by the tool pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u32,
    pub description: String,
    pub action: String,
    pub params: Map<String, Value>,
    pub image_url: String,
    pub screen_elements: Vec<ScreenElement>,
    pub status: StepStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl StepRecord {
    pub fn new(step: u32, description: impl Into<String>) -> Self {
        Self {
            step,
            description: description.into(),
            action: String::new(),
            params: Map::new(),
            image_url: String::new(),
            screen_elements: Vec::new(),
            status: StepStatus::Pending,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Ordered ledger of step records for one task. Created once per task and
/// serialized into a report after the task ends.
#[derive(Debug, Serialize)]
pub struct TaskContext {
    pub task_id: String,
    steps: Vec<StepRecord>,
    current: Option<usize>,
    /// Set by the driver when more than one tool call arrived in a single
    /// reasoning turn; checked by the single-flight guard.
    #[serde(skip)]
    pub parallel_tool_calls: bool,
    #[serde(skip)]
    pub torn_down: bool,
}

impl TaskContext {
    pub fn new() -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            steps: Vec::new(),
            current: None,
            parallel_tool_calls: false,
            torn_down: false,
        }
    }

    /// Returns the existing record for `step` or creates one, and sets it as
    /// the current step either way.
    pub fn add_step(&mut self, step: u32, description: &str) -> &mut StepRecord {
        let pos = match self.steps.iter().position(|s| s.step == step) {
            Some(pos) => pos,
            None => {
                self.steps.push(StepRecord::new(step, description));
                self.steps.len() - 1
            }
        };
        self.current = Some(pos);
        &mut self.steps[pos]
    }

    pub fn current_step(&self) -> Option<&StepRecord> {
        self.current.map(|pos| &self.steps[pos])
    }

    pub fn current_step_mut(&mut self) -> Option<&mut StepRecord> {
        self.current.map(move |pos| &mut self.steps[pos])
    }

    /// Terminal failure signal: the driving loop must not advance to further
    /// planned steps after this.
    pub fn set_step_failed(&mut self, reason: &str) {
        if let Some(step) = self.current_step_mut() {
            step.status = StepStatus::Failed;
            step.action = "mark_failed".into();
            step.params = Map::from_iter([("reason".to_string(), Value::String(reason.into()))]);
        }
    }

    /// Writes the sanitized tool parameters into the current record and marks
    /// it running.
    pub fn update_current_step(&mut self, action: &str, params: Map<String, Value>) {
        if let Some(step) = self.current_step_mut() {
            step.action = action.into();
            step.params = params;
            step.status = StepStatus::Running;
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn has_failed_step(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}
