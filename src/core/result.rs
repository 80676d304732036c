//! 执行结果模型
//!
//! ToolExecutionResult（单次调用）-> StepResult（单步汇总）-> PlanExecutionResult（整次执行）-> TaskRun（含任务与计划的完整记录）。
//! 全部可序列化，状态字段输出为 snake_case 字符串。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::AgentError;
use crate::plan::{Plan, StepStatus};
use crate::tools::ToolInvocation;

/// 单次工具调用结果：成功带 result，失败带 error 文本；永远是值，不是异常
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool: String,
    pub args: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolExecutionResult {
    pub fn succeeded(invocation: &ToolInvocation, result: Value) -> Self {
        Self {
            tool: invocation.tool.clone(),
            args: invocation.args_value(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(invocation: &ToolInvocation, error: &AgentError) -> Self {
        Self {
            tool: invocation.tool.clone(),
            args: invocation.args_value(),
            success: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// 单步执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 模型对该步骤的原始输出
    pub execution_text: String,
    pub tool_executions: Vec<ToolExecutionResult>,
    pub status: StepStatus,
    pub summary: String,
    /// 步骤级故障（请求失败、被取消等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    /// 全部调用成功（含零调用）即 completed
    pub fn from_executions(execution_text: String, tool_executions: Vec<ToolExecutionResult>) -> Self {
        let status = if tool_executions.iter().all(|te| te.success) {
            StepStatus::Completed
        } else {
            StepStatus::Failed
        };
        let summary = summarize(&tool_executions);
        Self {
            execution_text,
            tool_executions,
            status,
            summary,
            error: None,
        }
    }

    /// 步骤内部故障收敛为失败结果，保留已完成的调用
    pub fn faulted(
        execution_text: String,
        tool_executions: Vec<ToolExecutionResult>,
        error: &AgentError,
    ) -> Self {
        let summary = format!("{} Step error: {}", summarize(&tool_executions), error);
        Self {
            execution_text,
            tool_executions,
            status: StepStatus::Failed,
            summary,
            error: Some(error.to_string()),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.tool_executions.iter().filter(|te| te.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tool_executions.len() - self.succeeded_count()
    }
}

fn summarize(tool_executions: &[ToolExecutionResult]) -> String {
    if tool_executions.is_empty() {
        return "Step execution: no tools invoked.".to_string();
    }
    let total = tool_executions.len();
    let succeeded = tool_executions.iter().filter(|te| te.success).count();
    let failed = total - succeeded;
    let status = if failed == 0 {
        format!("all {total} tool call(s) succeeded.")
    } else if succeeded == 0 {
        format!("all {total} tool call(s) failed.")
    } else {
        format!("{succeeded} tool call(s) succeeded, {failed} failed.")
    };
    let tools = tool_executions
        .iter()
        .map(|te| te.tool.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Step execution: {status} Tools used: {tools}.")
}

/// 每步记录（序号从 1 开始）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_num: usize,
    pub description: String,
    pub status: StepStatus,
    pub result: StepResult,
}

/// 整体状态：只有提前停止才为 failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Completed,
    Failed,
}

/// 提前停止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    StepFailed { step_num: usize },
    Cancelled { step_num: usize },
}

/// 一次计划执行的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExecutionResult {
    pub steps: Vec<StepRecord>,
    pub overall_status: OverallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// 秒
    pub duration: f64,
}

impl PlanExecutionResult {
    /// 失败步骤的序号（YOLO 模式下可能有多个）
    pub fn failed_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .map(|s| s.step_num)
            .collect()
    }

    /// 面向操作者的结论：区分全部完成、YOLO 下带失败继续、在第 N 步停止、被取消
    pub fn verdict(&self) -> String {
        match self.stop_reason {
            Some(StopReason::StepFailed { step_num }) => {
                format!("Stopped at step {step_num} because step {step_num} failed.")
            }
            Some(StopReason::Cancelled { step_num }) => {
                format!("Cancelled by operator during step {step_num}.")
            }
            None => {
                let failed = self.failed_steps();
                if failed.is_empty() {
                    format!("Completed all {} step(s).", self.steps.len())
                } else {
                    let list = failed
                        .iter()
                        .map(|n| n.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "Completed {} step(s); step(s) {list} failed but the run continued (YOLO mode).",
                        self.steps.len()
                    )
                }
            }
        }
    }
}

/// 一次完整任务运行：任务、计划、执行结果、模式与时间戳
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: Uuid,
    pub task: String,
    pub plan: Plan,
    pub execution: PlanExecutionResult,
    pub yolo_mode: bool,
    pub timestamp: DateTime<Utc>,
}
