//! LLM 层：决策步骤客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use ollama::{create_ollama_client, OLLAMA_BASE_URL, OLLAMA_DEFAULT_MODEL};
pub use openai::{OpenAiClient, TokenUsage, OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL};
pub use traits::{ChatRequest, LlmClient, LlmError, RetryConfig, RetryingLlmClient, ToolSpec};
