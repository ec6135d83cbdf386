//! 工具执行器
//!
//! 持有只读的 ToolRegistry：按名解析、参数校验、单次超时、瞬时失败重试一次、输出截断，
//! 并把任何失败转换为固定格式的字符串，工具调用不会向上抛错。
//! 每次调用输出一行结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::ToolFailure;
use crate::memory::ToolCall;
use crate::tools::output::truncate_output;
use crate::tools::{Tool, ToolRegistry};

/// 默认输出上限（字符）
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 2000;

/// 执行器参数
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 单次调用超时
    pub timeout: Duration,
    /// 输出字符上限，超出部分截断并加标记
    pub max_output_chars: usize,
    /// 重试前等待（默认不等待）
    pub retry_backoff: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            retry_backoff: Duration::ZERO,
        }
    }
}

/// 工具执行器：无状态，可在并发的多个轮次间共享
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// 执行一次调用，返回强类型结果：Ok 为已渲染并截断的输出，Err 为最终失败种类
    pub async fn run(&self, call: &ToolCall) -> Result<String, ToolFailure> {
        let tool = self.registry.resolve(&call.tool_name)?;
        let (result, _) = self.invoke_with_retry(tool.as_ref(), &call.arguments).await;
        result.map(|out| truncate_output(&out, self.config.max_output_chars))
    }

    /// 执行一次调用并总是返回文本（失败转为说明字符串），供写回对话历史
    pub async fn execute(&self, call: &ToolCall) -> String {
        let start = Instant::now();
        let tool = match self.registry.resolve(&call.tool_name) {
            Ok(t) => t,
            Err(failure) => {
                audit(call, false, "unknown_tool", 0, start);
                return truncate_output(
                    &self.describe_failure(None, &call.arguments, &failure),
                    self.config.max_output_chars,
                );
            }
        };

        let (result, attempts) = self.invoke_with_retry(tool.as_ref(), &call.arguments).await;
        let (ok, outcome, text) = match result {
            Ok(text) => (true, "ok", text),
            Err(failure) => {
                let outcome = match &failure {
                    ToolFailure::InvalidArguments(_) => "invalid_arguments",
                    ToolFailure::NotConfigured(_) => "not_configured",
                    ToolFailure::Transient(_) => "transient",
                    ToolFailure::Rejected(_) => "rejected",
                    ToolFailure::UnknownTool(_) => "unknown_tool",
                };
                let text = self.describe_failure(Some(tool.as_ref()), &call.arguments, &failure);
                (false, outcome, text)
            }
        };
        audit(call, ok, outcome, attempts, start);
        truncate_output(&text, self.config.max_output_chars)
    }

    /// 首次调用 + 瞬时失败时重试一次（参数完全相同）；返回结果与实际调用次数
    async fn invoke_with_retry(&self, tool: &dyn Tool, args: &Value) -> (Result<String, ToolFailure>, u32) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match timeout(self.config.timeout, tool.invoke(args.clone())).await {
                Ok(r) => r,
                Err(_) => Err(ToolFailure::Transient(format!("timed out after {:?}", self.config.timeout))),
            };
            match result {
                Ok(output) => return (Ok(output.render()), attempts),
                Err(failure) if failure.is_transient() && attempts < 2 => {
                    tracing::warn!(tool = %tool.name(), error = %failure, "tool call failed, retrying once");
                    if !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
                Err(failure) => return (Err(failure), attempts),
            }
        }
    }

    /// 失败 -> 回流给模型的说明文本
    fn describe_failure(&self, tool: Option<&dyn Tool>, args: &Value, failure: &ToolFailure) -> String {
        match failure {
            ToolFailure::UnknownTool(name) => format!(
                "Error: unknown tool '{}'. This tool does not exist. Available tools: {}.",
                name,
                self.registry.tool_names().join(", ")
            ),
            ToolFailure::InvalidArguments(reason) => format!(
                "Invalid arguments for {}: {}. Check the tool's parameter schema and try again.",
                tool.map(|t| t.name()).unwrap_or("tool"),
                reason
            ),
            ToolFailure::NotConfigured(reason) => format!(
                "{} unavailable: {}",
                tool.map(|t| t.capability()).unwrap_or("Tool"),
                reason
            ),
            ToolFailure::Transient(reason) | ToolFailure::Rejected(reason) => match tool {
                Some(t) => format!("{} unavailable for {}: {}", t.capability(), t.subject(args), reason),
                None => format!("Tool unavailable: {}", reason),
            },
        }
    }
}

fn audit(call: &ToolCall, ok: bool, outcome: &str, attempts: u32, start: Instant) {
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": call.tool_name,
        "call_id": call.call_id,
        "ok": ok,
        "outcome": outcome,
        "attempts": attempts,
        "duration_ms": start.elapsed().as_millis() as u64,
        "args_preview": args_preview(&call.arguments),
    });
    tracing::info!(audit = %audit.to_string(), "tool");
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
