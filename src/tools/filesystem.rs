//! 工作区文件管理工具
//!
//! WorkspaceGuard 绑定工作区根目录，resolve 先做纯词法归一化（不访问文件系统）再判断是否在根下，
//! 随后要求最深的已存在祖先与悬空符号链接的目标在解析后仍位于规范化根下；
//! FileManager 在此基础上提供 read / write / append / delete / list 五种操作，FileManagerTool 暴露为 file_manager 工具。

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::core::AgentError;
use crate::tools::Tool;

/// 工作区守卫：所有路径必须解析到根目录内
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
}

impl WorkspaceGuard {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        };
        Self {
            root: normalize(&root),
        }
    }

    /// 解析相对（或绝对）路径；词法上逃逸根目录时直接返回 PathEscape，不进行任何 I/O
    ///
    /// 通过词法检查后，最深的已存在祖先（含路径本身）解析符号链接后必须仍在规范化根下；
    /// 路径本身是悬空符号链接时，按链接目标判断。
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let escape = || AgentError::PathEscape(path.to_string());
        let candidate = normalize(&self.root.join(path));
        if !candidate.starts_with(&self.root) {
            return Err(escape());
        }

        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let existing = candidate
            .ancestors()
            .take_while(|ancestor| ancestor.starts_with(&self.root))
            .find_map(|ancestor| ancestor.canonicalize().ok());
        if let Some(existing) = existing {
            if !existing.starts_with(&root) {
                return Err(escape());
            }
        }

        let mut link = candidate.clone();
        for _ in 0..MAX_LINK_HOPS {
            if !is_symlink(&link) {
                return Ok(candidate);
            }
            if let Ok(target) = link.canonicalize() {
                return if target.starts_with(&root) {
                    Ok(candidate)
                } else {
                    Err(escape())
                };
            }
            // 悬空链接：写入会在链接目标处创建文件
            let target = std::fs::read_link(&link).map_err(|_| escape())?;
            let base = link
                .parent()
                .and_then(|parent| parent.canonicalize().ok())
                .unwrap_or_else(|| root.clone());
            link = normalize(&base.join(target));
            if !link.starts_with(&root) {
                return Err(escape());
            }
        }
        Err(escape())
    }
}

const MAX_LINK_HOPS: usize = 16;

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// 词法归一化：处理 `.` 与 `..`，不跟随符号链接；`..` 越过根时停在根上（之后的前缀判断会拒绝）
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// 文件操作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
    Append,
    Delete,
    List,
}

impl FromStr for FileAction {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "append" => Ok(Self::Append),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            other => Err(AgentError::UnknownAction(other.to_string())),
        }
    }
}

/// 工作区内的文件管理器
#[derive(Debug, Clone)]
pub struct FileManager {
    guard: WorkspaceGuard,
}

impl FileManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            guard: WorkspaceGuard::new(root),
        }
    }

    /// 执行文件操作；action 在路径解析之前校验
    pub async fn manage(
        &self,
        action: &str,
        path: &str,
        content: Option<&str>,
    ) -> Result<Value, AgentError> {
        let action: FileAction = action.parse()?;
        let resolved = self.guard.resolve(path)?;
        tracing::info!(action = ?action, path = %path, "file_manager");

        match action {
            FileAction::Read => self.read(path, &resolved).await,
            FileAction::Write | FileAction::Append => {
                let content = content.unwrap_or_default();
                if let Some(parent) = resolved.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(action == FileAction::Append)
                    .truncate(action == FileAction::Write)
                    .open(&resolved)
                    .await?;
                file.write_all(content.as_bytes()).await?;
                file.flush().await?;
                let verb = if action == FileAction::Write {
                    "Wrote"
                } else {
                    "Appended"
                };
                Ok(json!({
                    "path": path,
                    "bytes": content.len(),
                    "message": format!("{verb} {} bytes to {path}", content.len()),
                }))
            }
            FileAction::Delete => {
                let meta = metadata(path, &resolved).await?;
                if meta.is_dir() {
                    return Err(AgentError::DirectoryDeletionRefused(path.to_string()));
                }
                tokio::fs::remove_file(&resolved).await?;
                Ok(json!({ "path": path, "message": format!("Deleted {path}") }))
            }
            FileAction::List => {
                let meta = metadata(path, &resolved).await?;
                if !meta.is_dir() {
                    return Err(AgentError::NotADirectory(path.to_string()));
                }
                let mut entries = Vec::new();
                let mut dir = tokio::fs::read_dir(&resolved).await?;
                while let Some(entry) = dir.next_entry().await? {
                    let meta = entry.metadata().await?;
                    let modified = meta
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true));
                    entries.push(json!({
                        "name": entry.file_name().to_string_lossy(),
                        "is_directory": meta.is_dir(),
                        "size": meta.len(),
                        "modified": modified,
                    }));
                }
                entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
                Ok(Value::Array(entries))
            }
        }
    }

    async fn read(&self, path: &str, resolved: &Path) -> Result<Value, AgentError> {
        let meta = metadata(path, resolved).await?;
        if meta.is_dir() {
            let mut names = Vec::new();
            let mut dir = tokio::fs::read_dir(resolved).await?;
            while let Some(entry) = dir.next_entry().await? {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
            names.sort();
            return Ok(json!(names));
        }
        let content = tokio::fs::read_to_string(resolved).await?;
        Ok(Value::String(content))
    }
}

async fn metadata(path: &str, resolved: &Path) -> Result<std::fs::Metadata, AgentError> {
    match tokio::fs::metadata(resolved).await {
        Ok(meta) => Ok(meta),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AgentError::PathNotFound(path.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// file_manager 工具：参数 action / path / content
pub struct FileManagerTool {
    manager: FileManager,
}

impl FileManagerTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            manager: FileManager::new(root),
        }
    }
}

#[async_trait]
impl Tool for FileManagerTool {
    fn name(&self) -> &str {
        "file_manager"
    }

    fn description(&self) -> &str {
        "Read, write, append, delete or list files inside the workspace directory. Args: {\"action\": \"read|write|append|delete|list\", \"path\": \"relative path\", \"content\": \"text for write/append\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["read", "write", "append", "delete", "list"]
                },
                "path": { "type": "string", "description": "Path relative to the workspace root" },
                "content": { "type": "string", "description": "Content for write / append" }
            },
            "required": ["action", "path"]
        })
    }

    fn example_args(&self) -> Value {
        json!({"action": "read", "path": "example.txt"})
    }

    async fn execute(&self, args: Value) -> Result<Value, AgentError> {
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::invalid_args("file_manager", "missing 'action'"))?;
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::invalid_args("file_manager", "missing 'path'"))?;
        let content = args.get("content").and_then(Value::as_str);
        self.manager.manage(action, path, content).await
    }
}
