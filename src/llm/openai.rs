//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；OpenAI、OpenRouter、自建代理均可。
//! 每次请求只发送一条 user 消息（即渲染好的 prompt）；停止序列随请求交给服务端处理。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, StopConfiguration,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{CompletionRequest, LlmClient};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名，complete 时取首条 choice 的 content
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new()
                .with_api_base(url)
                .with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<CreateChatCompletionRequest, AgentError> {
        let message = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(upstream)?,
        );
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(vec![message])
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens);
        if !request.stop.is_empty() {
            if request.stop.len() > MAX_STOP_SEQUENCES {
                tracing::warn!(count = request.stop.len(), "extra stop sequences dropped");
            }
            let stop = request.stop.iter().take(MAX_STOP_SEQUENCES).cloned().collect();
            args.stop(StopConfiguration::StringArray(stop));
        }
        args.build().map_err(upstream)
    }
}

/// OpenAI 兼容端点最多接受 4 个停止序列
const MAX_STOP_SEQUENCES: usize = 4;

fn upstream(e: impl std::fmt::Display) -> AgentError {
    AgentError::UpstreamRequestFailure(e.to_string())
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        let api_request = self.build_request(request)?;

        tracing::debug!(model = %self.model, prompt_chars = request.prompt.len(), "completion request");
        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(upstream)?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage.add(
                usage.prompt_tokens as u64,
                usage.completion_tokens as u64,
            );
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_sequences_sent_with_request() {
        let client = OpenAiClient::new(Some("http://localhost:9"), "test-model", Some("sk-test"));

        let request = CompletionRequest::new("hi".to_string(), 0.2, 64)
            .with_stop(vec!["END".to_string(), "\n\n".to_string()]);
        let api_request = client.build_request(&request).unwrap();
        assert_eq!(api_request.model, "test-model");
        assert_eq!(api_request.max_completion_tokens, Some(64));
        assert_eq!(
            api_request.stop,
            Some(StopConfiguration::StringArray(vec!["END".to_string(), "\n\n".to_string()]))
        );

        let plain = client
            .build_request(&CompletionRequest::new("hi".to_string(), 0.2, 64))
            .unwrap();
        assert_eq!(plain.stop, None);
    }
}
