//! 决策步骤（LLM）客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Ollama / Mock）实现 LlmClient：给定 system 指令、完整线程历史与
//! 可用工具描述，返回一条 assistant 消息（最终回复或携带 tool_calls）。
//! RetryingLlmClient 为任意后端加上单次调用超时与「瞬时失败重试一次」策略。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::memory::Message;

/// 传给模型的工具描述（名称、何时使用的说明、参数 JSON Schema）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 一次决策请求
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// 网络错误、超时、上游返回格式错误、429/5xx 视为瞬时失败，可重试一次
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::Network(_) | LlmError::MalformedResponse(_) => true,
            LlmError::Http { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Message, LlmError>;

    /// 模型名（用于 model_info 展示）
    fn model_name(&self) -> &str {
        "unknown"
    }

    fn temperature(&self) -> Option<f32> {
        None
    }

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 重试策略：单次调用超时 + 最多重试次数 + 重试前等待
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// 为内部客户端加超时与重试；超时与瞬时错误同等对待
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Message, LlmError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.config.timeout, self.inner.complete(request)).await {
                Ok(r) => r,
                Err(_) => Err(LlmError::Timeout),
            };
            match result {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        model = %self.inner.model_name(),
                        attempt,
                        error = %e,
                        "decision step failed, retrying"
                    );
                    if !self.config.backoff.is_zero() {
                        tokio::time::sleep(self.config.backoff).await;
                    }
                }
                other => return other,
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn temperature(&self) -> Option<f32> {
        self.inner.temperature()
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
