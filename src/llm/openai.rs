//! OpenAI 兼容 Chat Completions 客户端
//!
//! 通过 reqwest 直接调用 `{base_url}/chat/completions`（OpenAI、Ollama `/v1`、自建代理等），
//! 将线程历史（含 tool_calls / tool 结果）转换为 API 消息格式，并把返回的 tool_calls 解析为 ToolCall。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::llm::{ChatRequest, LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

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

/// OpenAI 兼容客户端：持有 HTTP Client、端点、模型名与温度
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            model: model.to_string(),
            api_key: api_key.map(String::from).filter(|k| !k.is_empty()),
            temperature,
            usage: TokenUsage::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// 线程历史 -> OpenAI messages（首条为 system）
pub(crate) fn build_openai_messages(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        out.push(json!({"role": "system", "content": system}));
    }
    for m in messages {
        match m.role {
            Role::User => out.push(json!({"role": "user", "content": m.content})),
            Role::Assistant => {
                let mut obj = json!({"role": "assistant", "content": m.content});
                if m.has_tool_calls() {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|c| {
                            let arguments = match &c.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            };
                            json!({
                                "id": c.call_id,
                                "type": "function",
                                "function": {"name": c.tool_name, "arguments": arguments}
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                    if m.content.is_empty() {
                        obj["content"] = Value::Null;
                    }
                }
                out.push(obj);
            }
            Role::Tool => out.push(json!({
                "role": "tool",
                "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
                "content": m.content
            })),
        }
    }
    out
}

pub(crate) fn build_openai_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters
                }
            })
        })
        .collect()
}

/// 解析非流式响应：取 choices[0].message 的 content 与 tool_calls
pub(crate) fn parse_openai_response(resp: &Value) -> Result<Message, LlmError> {
    let message = resp
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message".to_string()))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let func = &call["function"];
            let name = func["name"].as_str().unwrap_or_default().to_string();
            if name.is_empty() {
                return Err(LlmError::MalformedResponse("tool call without function name".to_string()));
            }
            let id = call["id"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(String::from)
                .unwrap_or_else(ToolCall::generate_id);
            // 参数可能是 JSON 字符串或对象；无法解析时保留原文，由工具校验给出说明
            let arguments = match &func["arguments"] {
                Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
                Value::Null => json!({}),
                other => other.clone(),
            };
            tool_calls.push(ToolCall::new(id, name, arguments));
        }
    }

    Ok(Message::assistant_with_tool_calls(content, tool_calls))
}

fn map_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_decode() {
        LlmError::MalformedResponse(e.to_string())
    } else {
        LlmError::Network(e.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Message, LlmError> {
        let mut payload = json!({
            "model": self.model,
            "messages": build_openai_messages(request.system, request.messages),
            "temperature": self.temperature,
            "stream": false,
        });
        if !request.tools.is_empty() {
            payload["tools"] = json!(build_openai_tools(request.tools));
        }

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, messages = request.messages.len(), "chat completion request");

        let mut builder = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let body: Value = response.json().await.map_err(map_reqwest_error)?;

        if let Some(usage) = body.get("usage") {
            self.usage.add(
                usage["prompt_tokens"].as_u64().unwrap_or(0),
                usage["completion_tokens"].as_u64().unwrap_or(0),
            );
        }

        parse_openai_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> Option<f32> {
        Some(self.temperature)
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}
