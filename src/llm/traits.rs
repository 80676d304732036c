//! 补全服务抽象
//!
//! 所有后端（OpenAI 兼容 / OpenRouter / Mock）实现 LlmClient：一次请求 = prompt + 温度 + 最大输出 token + 可选停止序列。

use async_trait::async_trait;

use crate::core::AgentError;

/// 一次补全请求
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// 补全客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 返回生成文本；请求失败为 UpstreamRequestFailure
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 在最早出现的停止序列处截断（Mock 用；真实后端把停止序列交给服务端）
pub fn apply_stop_sequences(mut text: String, stop: &[String]) -> String {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();
    if let Some(idx) = cut {
        text.truncate(idx);
    }
    text
}
