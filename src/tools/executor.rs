//! 工具执行器
//!
//! 持有 ToolRegistry 与外层超时，dispatch(invocation, cancel) 在超时与取消令牌下调用 registry.execute，
//! 所有结果（成功、工具错误、超时、取消、未知工具）都收敛为 ToolExecutionResult；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, ToolExecutionResult};
use crate::tools::{ToolInvocation, ToolRegistry};

pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 90;

/// 工具执行器：对每次调用施加超时，从不向上抛出错误
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 分发一次调用；取消时返回 Cancelled 失败结果，调用方据此停止本次运行
    pub async fn dispatch(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> ToolExecutionResult {
        let start = Instant::now();
        let args = invocation.args_value();
        let args_preview = args_preview(&args);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            r = timeout(self.timeout, self.registry.execute(&invocation.tool, args)) => match r {
                Ok(inner) => inner,
                Err(_) => Err(AgentError::ToolTimeout(invocation.tool.clone())),
            },
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AgentError::ToolTimeout(_)) => "timeout",
            Err(AgentError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": invocation.tool,
            "ok": result.is_ok(),
            "outcome": outcome,
            "error_kind": result.as_ref().err().map(AgentError::kind),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(value) => ToolExecutionResult::succeeded(invocation, value),
            Err(e) => ToolExecutionResult::failed(invocation, &e),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn capability_summary(&self) -> String {
        self.registry.capability_summary()
    }

    pub fn tool_schemas(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::tools::Tool;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps for a while"
        }

        async fn execute(&self, _args: Value) -> Result<Value, AgentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!("done"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: Value) -> Result<Value, AgentError> {
            Err(AgentError::PathNotFound("missing.txt".into()))
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        registry.register(FailingTool);
        ToolExecutor::new(registry, DEFAULT_TOOL_TIMEOUT_SECS)
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_failed_result() {
        let result = executor()
            .dispatch(&ToolInvocation::new("teleport", json!({})), &CancellationToken::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: teleport"));
    }

    #[tokio::test]
    async fn test_tool_error_is_captured() {
        let result = executor()
            .dispatch(&ToolInvocation::new("failing", json!({"x": 1})), &CancellationToken::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.args, json!({"x": 1}));
        assert!(result.error.unwrap().contains("missing.txt"));
    }

    #[tokio::test]
    async fn test_outer_timeout() {
        let executor = executor().with_timeout(Duration::from_millis(100));
        let result = executor
            .dispatch(&ToolInvocation::new("slow", json!({})), &CancellationToken::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool timeout: slow"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_dispatch() {
        let executor = executor();
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let result = executor
            .dispatch(&ToolInvocation::new("slow", json!({})), &token)
            .await;
        assert_eq!(result.error.as_deref(), Some("Cancelled by operator"));
    }
}
