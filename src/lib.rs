//! TaskBee - 规划 / 执行型任务智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器、执行结果模型、运行历史、会话监管、构建器
//! - **llm**: 补全客户端抽象与实现（OpenAI 兼容 / OpenRouter / Mock）
//! - **observability**: tracing 初始化
//! - **plan**: 计划模型、计划文本解析、工具调用提取、prompt 模板
//! - **tools**: 命令策略、执行后端、内置工具、注册表与分发执行器

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod tools;

pub use crate::core::{AgentError, Orchestrator, OrchestratorBuilder, TaskRun};
