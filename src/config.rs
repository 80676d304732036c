//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TASKBEE__*` 覆盖（双下划线表示嵌套，如 `TASKBEE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::tools::policy::{DEFAULT_ALLOWED_COMMANDS, DEFAULT_BLOCKED_PATTERNS};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、工作目录、默认执行模式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 文件工具的工作区根目录
    pub workspace_root: PathBuf,
    /// 步骤失败后是否继续（YOLO）
    pub default_yolo_mode: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "taskbee".to_string(),
            workspace_root: PathBuf::from("./workspace"),
            default_yolo_mode: false,
        }
    }
}

/// [llm] 段：后端选择与两类请求的采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openrouter / openai；没有任何 API key 时退回 mock
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub planning: SamplingSection,
    pub execution: SamplingSection,
    pub stop_sequences: Vec<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: None,
            base_url: None,
            planning: SamplingSection {
                temperature: 0.2,
                max_tokens: 2048,
            },
            execution: SamplingSection {
                temperature: 0.7,
                max_tokens: 4096,
            },
            stop_sequences: Vec::new(),
        }
    }
}

/// [llm.planning] / [llm.execution]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SamplingSection {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// [tools] 段：分发超时与各工具子段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用的外层超时（秒）
    pub tool_timeout_secs: u64,
    pub shell: ShellSection,
    pub scraper: ScraperSection,
    pub search: SearchSection,
    pub extraction: ExtractionSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 90,
            shell: ShellSection::default(),
            scraper: ScraperSection::default(),
            search: SearchSection::default(),
            extraction: ExtractionSection::default(),
        }
    }
}

/// [tools.shell] 段：命令策略与隔离执行
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// 首词白名单；为空表示不限制首词
    pub allowed_commands: Vec<String>,
    /// 子串黑名单，优先于白名单
    pub blocked_commands: Vec<String>,
    pub enable_sandbox: bool,
    pub container_runtime: String,
    pub sandbox_image: String,
    pub timeout_secs: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            allowed_commands: DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
            blocked_commands: DEFAULT_BLOCKED_PATTERNS.iter().map(|s| s.to_string()).collect(),
            enable_sandbox: true,
            container_runtime: "docker".to_string(),
            sandbox_image: "alpine:latest".to_string(),
            timeout_secs: 60,
        }
    }
}

/// [tools.scraper] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSection {
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for ScraperSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_result_chars: 5000,
        }
    }
}

/// [tools.search] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.duckduckgo.com/".to_string(),
            timeout_secs: 15,
            max_results: 5,
        }
    }
}

/// [tools.extraction] 段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    /// 没有结构化调用时按工具名关键词回退（默认关闭）
    pub keyword_fallback: bool,
}

/// 从 config 目录加载配置，环境变量 TASKBEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TASKBEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TASKBEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
