//! 计划与步骤
//!
//! Plan 是解析后顺序固定的 Step 序列；步骤状态只由 Orchestrator 原地修改（setter 为 crate 内可见）。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 步骤状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Unknown,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 计划中的一步：描述、子任务、状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    description: String,
    subtasks: Vec<String>,
    status: StepStatus,
}

impl Step {
    pub fn new(description: impl Into<String>, subtasks: Vec<String>) -> Self {
        Self {
            description: description.into(),
            subtasks,
            status: StepStatus::Pending,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn subtasks(&self) -> &[String] {
        &self.subtasks
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: StepStatus) {
        self.status = status;
    }
}

/// 有序步骤序列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn step_mut(&mut self, index: usize) -> Option<&mut Step> {
        self.steps.get_mut(index)
    }

    /// 规范文本形式：`N. 描述` + 缩进的 `- 子任务`，可被 parse_plan 还原
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step.description));
            for subtask in &step.subtasks {
                out.push_str(&format!("   - {}\n", subtask));
            }
        }
        out
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
