//! 编排器构建器：统一的初始化逻辑
//!
//! 从 AppConfig 与工作区目录构建工具注册表（含一次性协商的执行后端）、补全客户端与 prompt 模板，
//! CLI 与集成测试共用同一套装配。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::config::AppConfig;
use crate::core::{GenerationSettings, Orchestrator};
use crate::llm::{create_openrouter_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::plan::PromptSet;
use crate::tools::{
    CommandPolicy, ExecutionBackend, FileManagerTool, SandboxRunner, ShellTool, ToolExecutor,
    ToolRegistry, WebScraperTool, WebSearchTool,
};

/// 按 provider 与可用的 API key 选择后端；没有任何 key 时用 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_openrouter = std::env::var("OPENROUTER_API_KEY").is_ok();
    let has_openai = std::env::var("OPENAI_API_KEY").is_ok();

    if provider == "openai" && has_openai {
        let model = cfg.llm.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!(model = %model, "using OpenAI-compatible LLM");
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else if has_openrouter || has_openai {
        let client = create_openrouter_client(cfg.llm.model.as_deref(), cfg.llm.base_url.as_deref());
        tracing::info!(model = %client.model(), "using OpenRouter LLM");
        Arc::new(client)
    } else {
        tracing::warn!("No API key set, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 编排器构建器
pub struct OrchestratorBuilder {
    config: AppConfig,
    workspace: PathBuf,
    llm: Option<Arc<dyn LlmClient>>,
    backend: Option<ExecutionBackend>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig, workspace: PathBuf) -> Self {
        Self {
            config,
            workspace,
            llm: None,
            backend: None,
        }
    }

    /// 从配置构建：工作区取 [app].workspace_root，不存在则创建
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let workspace = config.app.workspace_root.clone();
        std::fs::create_dir_all(&workspace)
            .with_context(|| format!("creating workspace {}", workspace.display()))?;
        let workspace = workspace.canonicalize().unwrap_or(workspace);
        Ok(Self::new(config, workspace))
    }

    /// 指定补全客户端（测试用 Mock）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 跳过协商，直接指定执行后端
    pub fn with_backend(mut self, backend: ExecutionBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// 构建工具注册表：web_scraper、shell_command、file_manager、web_search
    pub fn build_tool_registry(&self, backend: ExecutionBackend) -> ToolRegistry {
        let tools_cfg = &self.config.tools;
        let policy = CommandPolicy::new(
            tools_cfg.shell.allowed_commands.clone(),
            tools_cfg.shell.blocked_commands.clone(),
        );
        let runner = SandboxRunner::new(policy, backend)
            .with_timeout(Duration::from_secs(tools_cfg.shell.timeout_secs));

        let mut tools = ToolRegistry::new();
        tools.register(WebScraperTool::new(
            tools_cfg.scraper.timeout_secs,
            tools_cfg.scraper.max_result_chars,
        ));
        tools.register(ShellTool::new(runner));
        tools.register(FileManagerTool::new(&self.workspace));
        tools.register(WebSearchTool::new(
            tools_cfg.search.endpoint.clone(),
            tools_cfg.search.timeout_secs,
            tools_cfg.search.max_results,
        ));
        tools
    }

    /// 协商执行后端并装配编排器
    pub async fn build(self) -> anyhow::Result<Orchestrator> {
        let backend = match self.backend.clone() {
            Some(backend) => backend,
            None => {
                let shell = &self.config.tools.shell;
                ExecutionBackend::negotiate(
                    shell.enable_sandbox,
                    &shell.container_runtime,
                    &shell.sandbox_image,
                )
                .await
            }
        };
        tracing::info!(backend = backend.name(), workspace = %self.workspace.display(), "execution backend selected");

        let registry = self.build_tool_registry(backend);
        anyhow::ensure!(!registry.is_empty(), "no tools registered");
        let executor = ToolExecutor::new(registry, self.config.tools.tool_timeout_secs);
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config));

        Ok(Orchestrator::new(llm, executor)
            .with_prompts(PromptSet::load())
            .with_settings(GenerationSettings::from(&self.config.llm))
            .with_keyword_fallback(self.config.tools.extraction.keyword_fallback))
    }
}
