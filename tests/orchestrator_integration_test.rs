//! 编排器端到端测试：Mock 补全客户端 + 真实 file_manager / shell_command 工具（本地后端）

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taskbee::config::AppConfig;
use taskbee::core::{AgentError, OverallStatus, StopReason};
use taskbee::llm::{CompletionRequest, LlmClient, MockLlmClient};
use taskbee::plan::StepStatus;
use taskbee::tools::ExecutionBackend;
use taskbee::{Orchestrator, OrchestratorBuilder};

fn tool_call(tool: &str, args: &str) -> String {
    format!("Running {tool}.\n```tool_call\n{{\"tool\": \"{tool}\", \"args\": {args}}}\n```")
}

fn three_step_script() -> Vec<String> {
    vec![
        "1. Write notes\n   - create notes.txt\n2. Read the report\n3. Confirm\n".to_string(),
        tool_call("file_manager", r#"{"action": "write", "path": "notes.txt", "content": "hi"}"#),
        tool_call("file_manager", r#"{"action": "read", "path": "missing.txt"}"#),
        tool_call("shell_command", r#"{"command": "echo done"}"#),
    ]
}

async fn orchestrator(workspace: &Path, llm: Arc<dyn LlmClient>) -> Orchestrator {
    OrchestratorBuilder::new(AppConfig::default(), workspace.to_path_buf())
        .with_llm(llm)
        .with_backend(ExecutionBackend::Local)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_failed_step_stops_run_without_yolo() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::scripted(three_step_script()));
    let mut orch = orchestrator(dir.path(), mock).await;

    let run = orch.run_task("Take notes", false).await.unwrap();

    assert_eq!(run.execution.steps.len(), 2);
    assert_eq!(run.execution.overall_status, OverallStatus::Failed);
    assert_eq!(run.execution.stop_reason, Some(StopReason::StepFailed { step_num: 2 }));
    assert_eq!(run.execution.steps[0].status, StepStatus::Completed);
    assert_eq!(
        run.execution.steps[1].result.tool_executions[0].error.as_deref(),
        Some("Path not found: missing.txt")
    );
    assert_eq!(std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "hi");
    assert_eq!(run.execution.verdict(), "Stopped at step 2 because step 2 failed.");
}

#[tokio::test]
async fn test_yolo_runs_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::scripted(three_step_script()));
    let mut orch = orchestrator(dir.path(), mock).await;

    let run = orch.run_task("Take notes", true).await.unwrap();

    assert_eq!(run.execution.steps.len(), 3);
    assert_eq!(run.execution.overall_status, OverallStatus::Completed);
    assert!(run.execution.stop_reason.is_none());
    let last = &run.execution.steps[2].result;
    assert_eq!(last.status, StepStatus::Completed);
    assert_eq!(
        last.tool_executions[0].result.as_ref().unwrap()["stdout"]
            .as_str()
            .unwrap()
            .trim(),
        "done"
    );
    assert!(run.yolo_mode);
    assert_eq!(orch.history().latest().map(|r| r.id), Some(run.id));
}

#[tokio::test]
async fn test_context_carries_previous_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::scripted([
        "1. Think\n2. Act".to_string(),
        "No tools needed for this step.".to_string(),
        tool_call("shell_command", r#"{"command": "pwd"}"#),
    ]));
    let mut orch = orchestrator(dir.path(), mock.clone()).await;

    let run = orch.run_task("Think then act", false).await.unwrap();
    assert_eq!(run.execution.overall_status, OverallStatus::Completed);
    assert_eq!(run.execution.steps[0].status, StepStatus::Completed);
    assert!(run.execution.steps[0].result.tool_executions.is_empty());

    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("TASK: Think then act"));
    assert!(prompts[0].contains("- file_manager:"));
    assert!(prompts[1].contains("This is step 1 of 2 in the plan."));
    assert!(!prompts[1].contains("Previous step results:"));
    assert!(prompts[2].contains(
        "This is step 2 of 2 in the plan.\n\nPrevious step results:\nStep 1 result: Step execution: no tools invoked."
    ));
}

#[tokio::test]
async fn test_blocked_and_unknown_calls_fail_the_step() {
    let dir = tempfile::tempdir().unwrap();
    let step = format!(
        "{}\n{}",
        tool_call("shell_command", r#"{"command": "rm -rf /tmp/x"}"#),
        tool_call("teleport", "{}")
    );
    let mock = Arc::new(MockLlmClient::scripted(["1. Clean up".to_string(), step]));
    let mut orch = orchestrator(dir.path(), mock).await;

    let run = orch.run_task("Clean", false).await.unwrap();
    let result = &run.execution.steps[0].result;
    assert_eq!(result.status, StepStatus::Failed);
    assert_eq!(result.tool_executions.len(), 2);
    assert!(result.tool_executions[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("Command blocked"));
    assert_eq!(result.tool_executions[1].error.as_deref(), Some("Unknown tool: teleport"));
}

/// 规划立即返回，执行请求挂起直到被取消
struct HangingLlm;

#[async_trait]
impl LlmClient for HangingLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        if request.prompt.contains("TASK STEP:") {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        } else {
            Ok("1. Wait\n2. Never reached".to_string())
        }
    }
}

#[tokio::test]
async fn test_cancel_stops_run_even_in_yolo_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = orchestrator(dir.path(), Arc::new(HangingLlm)).await;

    let supervisor = orch.supervisor().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        supervisor.cancel();
    });

    let run = tokio::time::timeout(Duration::from_secs(10), orch.run_task("wait", true))
        .await
        .expect("run should stop after cancellation")
        .unwrap();

    assert_eq!(run.execution.steps.len(), 1);
    assert_eq!(run.execution.overall_status, OverallStatus::Failed);
    assert_eq!(run.execution.stop_reason, Some(StopReason::Cancelled { step_num: 1 }));
    assert_eq!(run.execution.steps[0].result.error.as_deref(), Some("Cancelled by operator"));
    assert_eq!(run.execution.verdict(), "Cancelled by operator during step 1.");
}

#[tokio::test]
async fn test_cancel_before_run_starts_is_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::scripted(["1. Never planned".to_string()]));
    let mut orch = orchestrator(dir.path(), mock.clone()).await;

    orch.supervisor().clone().cancel();
    let err = orch.run_task("anything", true).await.unwrap_err();
    assert_eq!(err, AgentError::Cancelled);
    assert!(orch.history().is_empty());

    let run = orch.run_task("anything", true).await.unwrap();
    assert_eq!(run.plan.len(), 1);
}

#[tokio::test]
async fn test_execution_prompt_lists_tool_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockLlmClient::scripted(["1. Look around".to_string()]));
    let mut orch = orchestrator(dir.path(), mock.clone()).await;

    orch.run_task("Look", false).await.unwrap();
    assert_eq!(orch.history().len(), 1);

    let prompts = mock.prompts();
    assert!(prompts[1].contains("\"name\": \"shell_command\""));
    assert!(prompts[1].contains("\"command\""));
    assert!(prompts[1].contains("\"action\""));
    assert!(prompts[1].contains("\"url\""));

    orch.clear_history();
    assert!(orch.history().is_empty());
}
