//! 工具层：命令策略、执行后端、四个内置工具、注册表与分发执行器

pub mod executor;
pub mod filesystem;
pub mod policy;
pub mod registry;
pub mod sandbox;
pub mod schema;
pub mod scraper;
pub mod search;
pub mod shell;

pub use executor::{ToolExecutor, DEFAULT_TOOL_TIMEOUT_SECS};
pub use filesystem::{FileAction, FileManager, FileManagerTool, WorkspaceGuard};
pub use policy::CommandPolicy;
pub use registry::{Tool, ToolRegistry};
pub use sandbox::{ExecutionBackend, ExecutionOutcome, SandboxRunner};
pub use schema::{tool_call_schema_json, ToolInvocation};
pub use self::scraper::WebScraperTool;
pub use search::WebSearchTool;
pub use shell::ShellTool;
