//! 编排器：规划 -> 逐步执行 -> 汇总
//!
//! plan 请求模型生成计划文本并解析；execute_plan 严格按顺序执行每一步（构建上下文、请求执行文本、
//! 提取工具调用并逐个分发、汇总为 StepResult）。步骤失败且非 YOLO 模式时立即停止；
//! 取消令牌贯穿模型请求与每次工具分发，取消后无论模式如何都停止。
//! run_task 组合两者并把 TaskRun 写入历史。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{LlmSection, SamplingSection};
use crate::core::{
    AgentError, HistoryStore, OverallStatus, PlanExecutionResult, SessionSupervisor, StepRecord,
    StepResult, StopReason, TaskRun, ToolExecutionResult,
};
use crate::llm::{CompletionRequest, LlmClient};
use crate::plan::{parse_plan, render_task_step, IntentExtractor, Plan, PromptSet, StepStatus};
use crate::tools::ToolExecutor;

/// 两类请求的采样参数与停止序列
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub planning: SamplingSection,
    pub execution: SamplingSection,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&LlmSection::default())
    }
}

impl From<&LlmSection> for GenerationSettings {
    fn from(llm: &LlmSection) -> Self {
        Self {
            planning: llm.planning,
            execution: llm.execution,
            stop_sequences: llm.stop_sequences.clone(),
        }
    }
}

/// 编排器：同一时刻只处理一个任务（run_task 需要 &mut self）
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    extractor: IntentExtractor,
    prompts: PromptSet,
    settings: GenerationSettings,
    history: HistoryStore,
    supervisor: SessionSupervisor,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor) -> Self {
        let extractor = IntentExtractor::new(executor.registry());
        Self {
            llm,
            executor,
            extractor,
            prompts: PromptSet::default(),
            settings: GenerationSettings::default(),
            history: HistoryStore::new(),
            supervisor: SessionSupervisor::new(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_keyword_fallback(mut self, enabled: bool) -> Self {
        self.extractor = self.extractor.with_keyword_fallback(enabled);
        self
    }

    /// 生成计划；模型请求失败时返回 UpstreamRequestFailure
    pub async fn plan(&self, task: &str) -> Result<Plan, AgentError> {
        let run = self.supervisor.begin_run();
        self.plan_with(task, run.token()).await
    }

    /// 执行计划，逐步更新 plan 中的步骤状态
    pub async fn execute_plan(&self, plan: &mut Plan, yolo_mode: bool) -> PlanExecutionResult {
        let run = self.supervisor.begin_run();
        self.execute_plan_with(plan, yolo_mode, run.token()).await
    }

    /// 规划并执行任务，结果写入历史
    pub async fn run_task(&mut self, task: &str, yolo_mode: bool) -> Result<TaskRun, AgentError> {
        let guard = self.supervisor.begin_run();
        let cancel = guard.token();
        let id = Uuid::new_v4();
        tracing::info!(run_id = %id, yolo_mode, "task run started");

        let mut plan = self.plan_with(task, cancel).await?;
        let execution = self.execute_plan_with(&mut plan, yolo_mode, cancel).await;
        drop(guard);

        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::info!(
            run_id = %id,
            status = ?execution.overall_status,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "task run finished"
        );

        let run = TaskRun {
            id,
            task: task.to_string(),
            plan,
            execution,
            yolo_mode,
            timestamp: Utc::now(),
        };
        self.history.push(run.clone());
        Ok(run)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// 取消句柄，可克隆后交给 Ctrl+C 处理器
    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    async fn plan_with(&self, task: &str, cancel: &CancellationToken) -> Result<Plan, AgentError> {
        let prompt = self
            .prompts
            .planning_prompt(task, &self.executor.capability_summary());
        tracing::debug!(prompt_chars = prompt.len(), "planning prompt");
        let request = CompletionRequest::new(
            prompt,
            self.settings.planning.temperature,
            self.settings.planning.max_tokens,
        )
        .with_stop(self.settings.stop_sequences.clone());

        let plan_text = self.complete(&request, cancel).await?;
        let plan = parse_plan(&plan_text);
        tracing::info!(steps = plan.len(), "plan generated");
        if plan.is_empty() {
            tracing::warn!("plan text contained no numbered steps");
        }
        Ok(plan)
    }

    async fn execute_plan_with(
        &self,
        plan: &mut Plan,
        yolo_mode: bool,
        cancel: &CancellationToken,
    ) -> PlanExecutionResult {
        let start_time = Utc::now();
        let started = Instant::now();
        let total = plan.len();
        let mut records: Vec<StepRecord> = Vec::with_capacity(total);
        let mut stop_reason = None;

        for index in 0..total {
            let step_num = index + 1;
            if cancel.is_cancelled() {
                tracing::warn!(step_num, "run cancelled before step started");
                stop_reason = Some(StopReason::Cancelled { step_num });
                break;
            }
            let Some(step) = plan.step_mut(index) else {
                break;
            };
            step.set_status(StepStatus::InProgress);
            let description = step.description().to_string();
            let task_step = render_task_step(step.description(), step.subtasks());
            tracing::info!(step_num, total, description = %description, "step started");

            let context = step_context(step_num, total, &records);
            let result = self.execute_step(&task_step, &context, cancel).await;
            let status = result.status;
            if let Some(step) = plan.step_mut(index) {
                step.set_status(status);
            }

            if status == StepStatus::Failed {
                tracing::warn!(step_num, summary = %result.summary, "step failed");
            } else {
                tracing::info!(step_num, summary = %result.summary, "step completed");
            }
            records.push(StepRecord {
                step_num,
                description,
                status,
                result,
            });

            if status == StepStatus::Failed && cancel.is_cancelled() {
                stop_reason = Some(StopReason::Cancelled { step_num });
                break;
            }
            if status == StepStatus::Failed && !yolo_mode {
                stop_reason = Some(StopReason::StepFailed { step_num });
                break;
            }
        }

        let overall_status = if stop_reason.is_some() {
            OverallStatus::Failed
        } else {
            OverallStatus::Completed
        };
        PlanExecutionResult {
            steps: records,
            overall_status,
            stop_reason,
            start_time,
            end_time: Utc::now(),
            duration: started.elapsed().as_secs_f64(),
        }
    }

    /// 单步边界：内部任何错误都收敛为失败的 StepResult
    async fn execute_step(
        &self,
        task_step: &str,
        context: &str,
        cancel: &CancellationToken,
    ) -> StepResult {
        let mut execution_text = String::new();
        let mut executions = Vec::new();
        match self
            .try_execute_step(task_step, context, cancel, &mut execution_text, &mut executions)
            .await
        {
            Ok(()) => StepResult::from_executions(execution_text, executions),
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "step fault");
                StepResult::faulted(execution_text, executions, &e)
            }
        }
    }

    async fn try_execute_step(
        &self,
        task_step: &str,
        context: &str,
        cancel: &CancellationToken,
        execution_text: &mut String,
        executions: &mut Vec<ToolExecutionResult>,
    ) -> Result<(), AgentError> {
        let prompt = self.prompts.execution_prompt(
            task_step,
            context,
            &self.executor.capability_summary(),
            &self.executor.tool_schemas(),
        );
        tracing::debug!(prompt_chars = prompt.len(), "execution prompt");
        let request = CompletionRequest::new(
            prompt,
            self.settings.execution.temperature,
            self.settings.execution.max_tokens,
        )
        .with_stop(self.settings.stop_sequences.clone());

        *execution_text = self.complete(&request, cancel).await?;

        let invocations = self.extractor.extract(execution_text);
        tracing::debug!(count = invocations.len(), "tool calls extracted");
        for invocation in &invocations {
            let result = self.executor.dispatch(invocation, cancel).await;
            executions.push(result);
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
        }
        Ok(())
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            r = self.llm.complete(request) => r,
        }
    }
}

/// 第 N 步的上下文：位置说明 + 之前每一步的摘要
fn step_context(step_num: usize, total: usize, previous: &[StepRecord]) -> String {
    let mut context = format!("This is step {step_num} of {total} in the plan.");
    if !previous.is_empty() {
        let lines = previous
            .iter()
            .map(|r| format!("Step {} result: {}", r.step_num, r.result.summary))
            .collect::<Vec<_>>()
            .join("\n");
        context.push_str("\n\nPrevious step results:\n");
        context.push_str(&lines);
    }
    context
}
