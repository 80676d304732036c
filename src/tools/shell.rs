//! Shell 命令工具：经 SandboxRunner 执行，策略与后端由 runner 决定
//!
//! 执行失败（策略拒绝、超时、非零退出）返回 Err，由 ToolExecutor 转为失败的 ToolExecutionResult。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::AgentError;
use crate::tools::{SandboxRunner, Tool};

/// shell_command 工具
pub struct ShellTool {
    runner: SandboxRunner,
}

impl ShellTool {
    pub fn new(runner: SandboxRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell_command"
    }

    fn description(&self) -> &str {
        "Executes a shell command in a sandboxed environment. Only allowlisted base commands run; commands containing blocked patterns are refused."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    fn example_args(&self) -> Value {
        json!({ "command": "ls -la" })
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AgentError::invalid_args(self.name(), "missing 'command'"))?;

        let outcome = self.runner.run(command).await;
        match outcome.error {
            None => Ok(outcome.to_json()),
            Some(e) => Err(e),
        }
    }
}
