//! Ollama 客户端（OpenAI 兼容格式）
//!
//! Ollama 在 `/v1` 下提供与 OpenAI 兼容的 Chat Completions 接口，直接复用 OpenAiClient。
//! - Base URL: http://localhost:11434/v1（可由 `OLLAMA_BASE_URL` 覆盖，缺少 `/v1` 时自动补齐）
//! - 模型: 默认 llama3.2（可由 `OLLAMA_MODEL` 覆盖）

use std::time::Duration;

use crate::llm::OpenAiClient;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

/// 补齐 `/v1` 后缀并去掉末尾斜杠
pub fn normalize_ollama_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.ends_with("/v1") {
        url.to_string()
    } else {
        format!("{}/v1", url)
    }
}

/// 创建 Ollama 客户端
///
/// 优先级：参数 > 环境变量 > 默认值
pub fn create_ollama_client(
    base_url: Option<&str>,
    model: Option<&str>,
    temperature: f32,
    timeout: Duration,
) -> OpenAiClient {
    let base_url = base_url
        .map(String::from)
        .or_else(|| std::env::var("OLLAMA_BASE_URL").ok())
        .map(|u| normalize_ollama_url(&u))
        .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("OLLAMA_MODEL").ok())
        .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string());

    OpenAiClient::new(Some(&base_url), &model, None, temperature, timeout)
}
