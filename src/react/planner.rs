//! Planner：决策步骤
//!
//! 把 system prompt、完整对话历史与工具描述交给 LLM，并把返回的助手消息归类为
//! 最终回复、工具调用或空决策。推理模型输出的 `<think>...</think>` 段在这里剥离。

use std::sync::Arc;

use crate::llm::{ChatRequest, LlmClient, LlmError, ToolSpec};
use crate::memory::Message;

/// 一次决策的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 最终回复：内容非空且不含工具调用
    Answer(Message),
    /// 携带一个或多个工具调用的助手消息
    ToolCalls(Message),
    /// 既无内容也无工具调用
    Empty,
}

/// 去掉 `<think>...</think>` 段；未闭合的 `<think>` 之后的内容全部丢弃
pub fn strip_think_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Planner：持有 LLM 与 system prompt
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn temperature(&self) -> Option<f32> {
        self.llm.temperature()
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn decide(&self, history: &[Message], tools: &[ToolSpec]) -> Result<Decision, LlmError> {
        let request = ChatRequest {
            system: &self.system_prompt,
            messages: history,
            tools,
        };
        let mut reply = self.llm.complete(&request).await?;
        reply.content = strip_think_tags(&reply.content);
        if reply.has_tool_calls() {
            return Ok(Decision::ToolCalls(Message::assistant_with_tool_calls(
                reply.content,
                reply.tool_calls,
            )));
        }
        if reply.content.is_empty() {
            return Ok(Decision::Empty);
        }
        Ok(Decision::Answer(Message::assistant(reply.content)))
    }
}
