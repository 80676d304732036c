//! Agent 错误类型
//!
//! 工具层与文件层的失败都以 AgentError 表示，并在分发层被转换为 ToolExecutionResult 中的错误文本，
//! 从不作为异常越过分发边界；编排层的故障则被收敛为失败的 StepResult。

use std::time::Duration;

use thiserror::Error;

/// 编排与工具执行过程中可能出现的错误（命令策略、沙箱、路径逃逸、上游请求等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Command blocked: contains forbidden pattern '{0}'")]
    CommandBlocked(String),

    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("Command timed out after {0:?}")]
    CommandTimeout(Duration),

    /// 非零退出码
    #[error("Command failed with exit code {code:?}: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("Sandbox init failure: {0}")]
    SandboxInitFailure(String),

    #[error("Sandbox execution failure: {0}")]
    SandboxExecutionFailure(String),

    #[error("Path escapes working directory: {0}")]
    PathEscape(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Refusing to delete directory: {0}")]
    DirectoryDeletionRefused(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Upstream request failed: {0}")]
    UpstreamRequestFailure(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// 分发层外层超时（区别于命令自身的 CommandTimeout）
    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Cancelled by operator")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 稳定的错误种类名，用于日志与审计
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommandBlocked(_) => "CommandBlocked",
            Self::CommandNotAllowed(_) => "CommandNotAllowed",
            Self::CommandTimeout(_) => "CommandTimeout",
            Self::CommandFailed { .. } => "CommandFailed",
            Self::SandboxInitFailure(_) => "SandboxInitFailure",
            Self::SandboxExecutionFailure(_) => "SandboxExecutionFailure",
            Self::PathEscape(_) => "PathEscape",
            Self::PathNotFound(_) => "PathNotFound",
            Self::NotADirectory(_) => "NotADirectory",
            Self::DirectoryDeletionRefused(_) => "DirectoryDeletionRefused",
            Self::UnknownAction(_) => "UnknownAction",
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::UpstreamRequestFailure(_) => "UpstreamRequestFailure",
            Self::Io(_) => "Io",
            Self::ToolTimeout(_) => "ToolTimeout",
            Self::Cancelled => "Cancelled",
            Self::ConfigError(_) => "ConfigError",
        }
    }

    pub(crate) fn invalid_args(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_duration() {
        let err = AgentError::CommandTimeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Command timed out after 60s");
        assert_eq!(err.kind(), "CommandTimeout");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AgentError = io.into();
        assert!(matches!(err, AgentError::Io(ref m) if m.contains("denied")));
    }
}
