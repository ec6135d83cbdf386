//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：直接回显最后一条用户消息；若上一条是工具结果则把结果转述出来。
//! - ScriptedLlmClient：按预设脚本逐条返回，并记录每次收到的完整历史，供测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatRequest, LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：不调用任何工具，直接给出最终回复
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Message, LlmError> {
        let last = request.messages.last();
        let reply = match last {
            Some(m) if m.role == Role::Tool => format!("Tool result: {}", m.content),
            _ => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                format!("Echo from Mock: {}", last_user)
            }
        };
        Ok(Message::assistant(reply))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// 脚本化客户端：依次弹出预设结果；脚本耗尽后返回 repeat（若设置）或错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<Message, LlmError>>>,
    repeat: Option<Message>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(script: Vec<Result<Message, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 只返回成功消息的脚本
    pub fn replies(replies: Vec<Message>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// 每次都返回同一条消息（如始终请求工具调用）
    pub fn repeating(message: Message) -> Self {
        Self {
            repeat: Some(message),
            ..Self::default()
        }
    }

    /// 被调用次数
    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// 每次调用收到的历史快照（按调用顺序）
    pub fn seen_histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Message, LlmError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(result) => result,
            None => self
                .repeat
                .clone()
                .ok_or_else(|| LlmError::MalformedResponse("script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let history = [Message::user("first"), Message::assistant("ok"), Message::user("second")];
        let reply = MockLlmClient
            .complete(&ChatRequest {
                system: "",
                messages: &history,
                tools: &[],
            })
            .await
            .unwrap();
        assert_eq!(reply.content, "Echo from Mock: second");
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_records_histories() {
        let client = ScriptedLlmClient::replies(vec![Message::assistant("a"), Message::assistant("b")]);
        let history = [Message::user("q")];
        let req = ChatRequest {
            system: "",
            messages: &history,
            tools: &[],
        };
        assert_eq!(client.complete(&req).await.unwrap().content, "a");
        assert_eq!(client.complete(&req).await.unwrap().content, "b");
        assert!(client.complete(&req).await.is_err());
        assert_eq!(client.calls(), 3);
        assert_eq!(client.seen_histories()[0], history.to_vec());
    }
}
