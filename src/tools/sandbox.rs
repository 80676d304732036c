//! 命令沙箱执行器
//!
//! 启动时一次性协商执行后端（容器 / 本地子进程），之后不可变；
//! 每条命令先过 CommandPolicy，再在所选后端中带硬超时执行。
//! 容器后端：生成临时脚本以只读方式挂载进一次性容器，任何退出路径上都会删除容器与脚本。

use std::io::Write;
use std::process::{Output, Stdio};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Command;

use crate::core::AgentError;
use crate::tools::CommandPolicy;

/// 本地执行默认超时
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// 容器内脚本挂载点
const SCRIPT_MOUNT_POINT: &str = "/opt/taskbee/run.sh";

/// 探测容器运行时的超时
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// 执行后端：启动时协商一次，运行期不再切换
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionBackend {
    Local,
    Container { runtime: String, image: String },
}

impl ExecutionBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Container { .. } => "container",
        }
    }

    /// 能力协商：启用隔离且运行时可用则用容器，否则回退本地执行并记录日志
    pub async fn negotiate(enable_isolation: bool, runtime: &str, image: &str) -> Self {
        if !enable_isolation {
            tracing::info!("container sandbox disabled, using local execution");
            return Self::Local;
        }
        match probe_runtime(runtime).await {
            Ok(()) => {
                tracing::info!(runtime = %runtime, image = %image, "container sandbox enabled");
                Self::Container {
                    runtime: runtime.to_string(),
                    image: image.to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    runtime = %runtime,
                    error = %e,
                    "container sandbox unavailable, falling back to local execution"
                );
                Self::Local
            }
        }
    }
}

async fn probe_runtime(runtime: &str) -> Result<(), AgentError> {
    let mut cmd = Command::new(runtime);
    cmd.arg("version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let status = tokio::time::timeout(PROBE_TIMEOUT, cmd.status())
        .await
        .map_err(|_| AgentError::SandboxInitFailure(format!("{runtime} did not respond")))?
        .map_err(|e| AgentError::SandboxInitFailure(format!("{runtime}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(AgentError::SandboxInitFailure(format!(
            "{runtime} version exited with {status}"
        )))
    }
}

/// 单条命令的执行结果；失败以值返回，不抛出
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub command: String,
    pub backend: &'static str,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<AgentError>,
}

impl ExecutionOutcome {
    fn failed(command: &str, backend: &'static str, error: AgentError) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            backend,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: Some(error),
        }
    }

    fn from_output(command: &str, backend: &'static str, output: Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();
        let error = if output.status.success() {
            None
        } else {
            Some(AgentError::CommandFailed {
                code: exit_code,
                stderr: stderr.trim().to_string(),
            })
        };
        Self {
            success: output.status.success(),
            command: command.to_string(),
            backend,
            stdout,
            stderr,
            exit_code,
            error,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "success": self.success,
            "command": self.command,
            "backend": self.backend,
            "stdout": self.stdout,
            "stderr": self.stderr,
            "returncode": self.exit_code,
            "error": self.error.as_ref().map(|e| e.to_string()),
        })
    }
}

/// 沙箱执行器：策略 + 已协商的后端 + 硬超时
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    policy: CommandPolicy,
    backend: ExecutionBackend,
    timeout: Duration,
}

impl SandboxRunner {
    pub fn new(policy: CommandPolicy, backend: ExecutionBackend) -> Self {
        Self {
            policy,
            backend,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn local(policy: CommandPolicy) -> Self {
        Self::new(policy, ExecutionBackend::Local)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &ExecutionBackend {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行命令：策略拒绝、超时、启动失败、非零退出都体现在返回值中
    pub async fn run(&self, command: &str) -> ExecutionOutcome {
        let command = command.trim();
        let backend = self.backend.name();
        if let Err(e) = self.policy.check(command) {
            return ExecutionOutcome::failed(command, backend, e);
        }

        tracing::info!(command = %command, backend = %backend, "executing command");

        let result = match &self.backend {
            ExecutionBackend::Local => self.run_local(command).await,
            ExecutionBackend::Container { runtime, image } => {
                self.run_isolated(command, runtime, image).await
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(command = %command, error = %e, "command execution failed");
                ExecutionOutcome::failed(command, backend, e)
            }
        }
    }

    async fn run_local(&self, command: &str) -> Result<ExecutionOutcome, AgentError> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AgentError::CommandTimeout(self.timeout))?
            .map_err(|e| AgentError::SandboxExecutionFailure(format!("spawn failed: {e}")))?;

        Ok(ExecutionOutcome::from_output(command, "local", output))
    }

    async fn run_isolated(
        &self,
        command: &str,
        runtime: &str,
        image: &str,
    ) -> Result<ExecutionOutcome, AgentError> {
        // 脚本与容器的清理都挂在作用域上：提前返回、超时、被取消时同样生效
        let script = write_script(command)?;
        let container = ContainerGuard::new(runtime);
        let mount = format!("{}:{}:ro", script.path().display(), SCRIPT_MOUNT_POINT);

        let mut cmd = Command::new(runtime);
        cmd.args(["run", "--rm", "--name", container.name(), "--network", "none", "-v"])
            .arg(&mount)
            .args([image, "/bin/sh", SCRIPT_MOUNT_POINT])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AgentError::CommandTimeout(self.timeout))?
            .map_err(|e| AgentError::SandboxExecutionFailure(format!("{runtime}: {e}")))?;

        Ok(ExecutionOutcome::from_output(command, "container", output))
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    }
}

/// 生成只含该命令的临时脚本，NamedTempFile 析构时删除
fn write_script(command: &str) -> Result<tempfile::NamedTempFile, AgentError> {
    let mut file = tempfile::Builder::new()
        .prefix("taskbee-")
        .suffix(".sh")
        .tempfile()
        .map_err(|e| AgentError::SandboxExecutionFailure(format!("script creation failed: {e}")))?;
    writeln!(file, "#!/bin/sh")?;
    writeln!(file, "{command}")?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(file)
}

/// 一次性容器名与强制删除：析构时在后台执行 `<runtime> rm -f <name>`
struct ContainerGuard {
    runtime: String,
    name: String,
}

impl ContainerGuard {
    fn new(runtime: &str) -> Self {
        Self {
            runtime: runtime.to_string(),
            name: format!("taskbee-{}", uuid::Uuid::new_v4().simple()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(container = %self.name, "no runtime available to remove container");
            return;
        };
        let runtime = std::mem::take(&mut self.runtime);
        let name = std::mem::take(&mut self.name);
        handle.spawn(async move {
            let status = Command::new(&runtime)
                .args(["rm", "-f", &name])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            tracing::debug!(container = %name, ?status, "container teardown");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissive_policy() -> CommandPolicy {
        let mut policy = CommandPolicy::default();
        policy.allow("sleep");
        policy
    }

    #[tokio::test]
    async fn test_policy_rejection_is_a_value() {
        let runner = SandboxRunner::local(CommandPolicy::default());
        let outcome = runner.run("rm -rf /tmp/whatever").await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error,
            Some(AgentError::CommandBlocked("rm".to_string()))
        );
        assert_eq!(outcome.exit_code, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_echo_captures_stdout() {
        let runner = SandboxRunner::local(CommandPolicy::default());
        let outcome = runner.run("echo hello").await;
        assert!(outcome.success, "{:?}", outcome);
        assert_eq!(outcome.stdout.trim(), "hello");
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.backend, "local");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_yields_failure_outcome() {
        let runner = SandboxRunner::local(permissive_policy())
            .with_timeout(Duration::from_millis(300));
        let outcome = runner.run("sleep 5").await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error,
            Some(AgentError::CommandTimeout(Duration::from_millis(300)))
        );
        assert!(outcome.to_json()["error"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure_with_code() {
        let runner = SandboxRunner::local(CommandPolicy::default());
        let outcome = runner.run("ls /taskbee/definitely/not/here").await;
        assert!(!outcome.success);
        assert!(matches!(outcome.exit_code, Some(code) if code != 0));
        assert!(matches!(outcome.error, Some(AgentError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn test_negotiation_disabled_is_local() {
        let backend = ExecutionBackend::negotiate(false, "docker", "alpine:latest").await;
        assert_eq!(backend, ExecutionBackend::Local);
    }

    #[tokio::test]
    async fn test_negotiation_falls_back_when_runtime_missing() {
        let backend =
            ExecutionBackend::negotiate(true, "taskbee-no-such-runtime", "alpine:latest").await;
        assert_eq!(backend, ExecutionBackend::Local);
    }

    #[test]
    fn test_script_contains_command_and_is_removed_on_drop() {
        let script = write_script("echo sandboxed").unwrap();
        let path = script.path().to_path_buf();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "#!/bin/sh\necho sandboxed\n");
        drop(script);
        assert!(!path.exists());
    }
}
