//! 消息模型：对话中的单条消息与工具调用记录
//!
//! 线程历史由 Message 顺序组成：user / assistant（可能携带 tool_calls）/ tool（工具结果，
//! 通过 tool_call_id 回指发起调用的 assistant 消息）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 OpenAI 兼容 API 一致；system 指令不进入线程历史）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// 工具结果
    Tool,
}

/// 决策步骤产生的一次工具调用请求；由 ToolExecutor 消费一次，结果以 Tool 消息写回
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    /// 已解析的参数（通常为 JSON 对象；模型输出无法解析时保留原始字符串，交给校验阶段报错）
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// 上游未提供 id 时生成一个（Ollama 等后端可能省略）
    pub fn generate_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// 仅 Tool 消息设置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// 携带工具调用的 assistant 消息（content 可以为空）
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// 是否声明了指定 call_id 的工具调用
    pub fn declares_call(&self, call_id: &str) -> bool {
        self.role == Role::Assistant && self.tool_calls.iter().any(|c| c.call_id == call_id)
    }
}
