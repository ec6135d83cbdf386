//! Web 搜索工具：Tavily Search API
//!
//! POST {base_url}/search，Bearer 认证；结果归一化为有序的 {title, url, summary}，
//! summary 超过字符预算时截断并追加 `…`。引号清洗由统一格式化器完成。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::ToolFailure;
use crate::tools::output::Field;
use crate::tools::{parameters_schema_for, parse_args, Tool, ToolOutput};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";
pub const DEFAULT_SUMMARY_CHARS: usize = 280;
pub const DEFAULT_MAX_RESULTS: usize = 2;
const MAX_RESULTS_LIMIT: usize = 10;

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// What to search for, e.g. "best museums in Lisbon"
    query: String,
    /// Maximum number of results (1-10)
    #[serde(default)]
    max_results: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
}

/// 归一化后的单条结果
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub summary: String,
}

/// 按字符预算截断摘要，超出时追加省略号
pub fn summarize(content: &str, budget: usize) -> String {
    let content = content.trim();
    if content.chars().count() > budget {
        let mut s: String = content.chars().take(budget).collect();
        s.push('…');
        s
    } else {
        content.to_string()
    }
}

/// 搜索工具
pub struct SearchTool {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_max_results: usize,
    summary_chars: usize,
}

impl SearchTool {
    pub fn new(base_url: Option<&str>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            base_url: base_url.unwrap_or(TAVILY_BASE_URL).trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            default_max_results: DEFAULT_MAX_RESULTS,
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }

    pub fn from_env(base_url: Option<&str>, api_key_env: &str, timeout: Duration) -> Self {
        Self::new(base_url, std::env::var(api_key_env).ok(), timeout)
    }

    pub fn with_limits(mut self, default_max_results: usize, summary_chars: usize) -> Self {
        self.default_max_results = default_max_results.clamp(1, MAX_RESULTS_LIMIT);
        self.summary_chars = summary_chars.max(1);
        self
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, ToolFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolFailure::NotConfigured("TAVILY_API_KEY not configured".to_string()))?;
        let url = format!("{}/search", self.base_url);
        let body = json!({ "query": query, "max_results": max_results });
        tracing::debug!(query = %query, max_results, "tavily request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolFailure::Transient("request timed out".to_string())
                } else {
                    ToolFailure::Transient("network error".to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            return Err(match code {
                429 | 500..=599 => ToolFailure::Transient(format!("HTTP {}", code)),
                _ => ToolFailure::Rejected(format!("HTTP {}", code)),
            });
        }
        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|_| ToolFailure::Transient("invalid response format".to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .filter_map(|r| {
                let title = r.title.unwrap_or_default().trim().to_string();
                let url = r.url.unwrap_or_default().trim().to_string();
                let content = r
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .or(r.raw_content)
                    .unwrap_or_default();
                let summary = summarize(&content, self.summary_chars);
                if title.is_empty() && url.is_empty() && summary.is_empty() {
                    None
                } else {
                    Some(Source { title, url, summary })
                }
            })
            .collect())
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search_tavily"
    }

    fn description(&self) -> &str {
        "Search the web for destination ideas, local attractions, events and travel tips. \
         Do not use for weather or packing questions. Returns sources with title, url and summary."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<SearchArgs>()
    }

    fn capability(&self) -> &str {
        "Search"
    }

    fn subject(&self, args: &Value) -> String {
        args.get("query")
            .and_then(|v| v.as_str())
            .map(|q| format!("'{}'", q.trim()))
            .unwrap_or_else(|| "query".to_string())
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput, ToolFailure> {
        let args: SearchArgs = parse_args(args)?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolFailure::InvalidArguments("query must not be empty".to_string()));
        }
        let max_results = args
            .max_results
            .map(|n| n.clamp(1, MAX_RESULTS_LIMIT as i64) as usize)
            .unwrap_or(self.default_max_results);

        let sources = self.search(query, max_results).await?;
        tracing::info!(query = %query, results = sources.len(), "web search completed");
        Ok(ToolOutput::structured(
            "sources",
            Field::List(
                sources
                    .into_iter()
                    .map(|s| {
                        Field::record([
                            ("title", Field::text(s.title)),
                            ("url", Field::text(s.url)),
                            ("summary", Field::text(s.summary)),
                        ])
                    })
                    .collect(),
            ),
        ))
    }
}
