//! 命令策略：黑名单子串优先，白名单首词
//!
//! 判定顺序：空命令拒绝 -> 任一黑名单子串出现在完整命令中即拒绝（白名单无法覆盖）->
//! 若配置了白名单，首词必须精确匹配 -> 否则放行。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 默认允许的命令名（仅首词）
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &["ls", "cat", "pwd", "echo", "grep", "find"];

/// 默认禁止的子串（对完整命令做子串匹配，不是按 token）
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &["rm", "mkfs", "dd", ">", "format"];

/// 命令策略：允许的基础命令集合 + 禁止的子串集合，可在运行前调整
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_BLOCKED_PATTERNS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl CommandPolicy {
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Self {
        let mut policy = Self {
            allowed: Vec::new(),
            blocked: Vec::new(),
        };
        for cmd in allowed {
            policy.allow(cmd);
        }
        for pattern in blocked {
            policy.block(pattern);
        }
        policy
    }

    /// 空白名单表示不限制首词（仍受黑名单约束）
    pub fn unrestricted(blocked: Vec<String>) -> Self {
        Self::new(Vec::new(), blocked)
    }

    pub fn allow(&mut self, command: impl Into<String>) {
        let command = command.into();
        if !command.is_empty() && !self.allowed.contains(&command) {
            self.allowed.push(command);
        }
    }

    pub fn block(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !pattern.is_empty() && !self.blocked.contains(&pattern) {
            self.blocked.push(pattern);
        }
    }

    pub fn allowed_commands(&self) -> &[String] {
        &self.allowed
    }

    /// 检查命令并给出具体拒绝原因
    pub fn check(&self, command: &str) -> Result<(), AgentError> {
        let Some(base) = command.split_whitespace().next() else {
            return Err(AgentError::CommandNotAllowed("empty command".to_string()));
        };

        if let Some(pattern) = self.blocked.iter().find(|p| command.contains(p.as_str())) {
            tracing::warn!(command = %command, pattern = %pattern, "command contains blocked pattern");
            return Err(AgentError::CommandBlocked(pattern.clone()));
        }

        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == base) {
            tracing::warn!(command = %command, base = %base, "command not in allowlist");
            return Err(AgentError::CommandNotAllowed(format!(
                "'{}' is not in the allowlist",
                base
            )));
        }

        Ok(())
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        self.check(command).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_allows_listing() {
        let policy = CommandPolicy::default();
        assert!(policy.is_allowed("ls -la"));
        assert!(policy.is_allowed("  echo hello  "));
    }

    #[test]
    fn test_default_policy_rejects_unlisted_base_command() {
        let policy = CommandPolicy::default();
        assert!(!policy.is_allowed("scp file host:"));
        assert!(matches!(
            policy.check("scp file host:"),
            Err(AgentError::CommandNotAllowed(_))
        ));
    }

    #[test]
    fn test_block_list_wins_over_allow_list() {
        let mut policy = CommandPolicy::default();
        policy.allow("rm");
        assert!(!policy.is_allowed("rm -rf /tmp"));
        assert_eq!(
            policy.check("rm -rf /tmp"),
            Err(AgentError::CommandBlocked("rm".to_string()))
        );
    }

    #[test]
    fn test_blocked_pattern_is_substring_not_token() {
        let policy = CommandPolicy::default();
        // 重定向符号出现在任意位置都会被拒绝
        assert!(!policy.is_allowed("echo hi>out.txt"));
        // "dd" 作为子串出现同样命中
        assert!(!policy.is_allowed("echo address"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let policy = CommandPolicy::default();
        assert!(!policy.is_allowed(""));
        assert!(!policy.is_allowed("   \t "));
    }

    #[test]
    fn test_empty_allow_list_accepts_any_unblocked_command() {
        let policy = CommandPolicy::unrestricted(vec!["mkfs".to_string()]);
        assert!(policy.is_allowed("uname -a"));
        assert!(!policy.is_allowed("mkfs.ext4 /dev/sda"));
    }

    #[test]
    fn test_allow_requires_exact_base_match() {
        let policy = CommandPolicy::default();
        assert!(!policy.is_allowed("lsof -i"));
        assert!(!policy.is_allowed("/bin/ls"));
    }
}
