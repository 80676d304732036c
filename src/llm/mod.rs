//! LLM 层：补全客户端抽象与实现（OpenAI 兼容 / OpenRouter / Mock）

pub mod mock;
pub mod openai;
pub mod openrouter;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use openrouter::{create_openrouter_client, OPENROUTER_BASE_URL, OPENROUTER_DEFAULT_MODEL};
pub use traits::{apply_stop_sequences, CompletionRequest, LlmClient};
