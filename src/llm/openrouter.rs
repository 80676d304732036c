//! OpenRouter 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://openrouter.ai/api/v1
//! - 默认模型: anthropic/claude-3-sonnet

use crate::llm::OpenAiClient;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENROUTER_DEFAULT_MODEL: &str = "anthropic/claude-3-sonnet";

/// 创建 OpenRouter 客户端
///
/// - 优先使用环境变量 `OPENROUTER_API_KEY`，其次 `OPENAI_API_KEY`
/// - 模型可通过 `model` 参数或 `OPENROUTER_MODEL` 环境变量指定
pub fn create_openrouter_client(model: Option<&str>, base_url: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("OPENROUTER_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("OPENROUTER_MODEL").ok())
        .unwrap_or_else(|| OPENROUTER_DEFAULT_MODEL.to_string());

    OpenAiClient::new(
        Some(base_url.unwrap_or(OPENROUTER_BASE_URL)),
        &model,
        Some(api_key.as_str()),
    )
}
