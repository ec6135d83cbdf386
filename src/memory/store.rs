//! 会话记忆：thread_id -> 有序消息历史
//!
//! 外层 RwLock 只保护线程表本身；每个线程各自持有一把 Mutex，
//! 同一线程内的追加严格串行，不同线程之间互不阻塞。
//! 历史只追加、不重排、不合并；仅在进程生命周期内保留。

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::memory::{Message, Role};

/// 线程标识（不透明字符串，调用方提供或由 new_thread_id 生成）
pub type ThreadId = String;

/// 生成新的线程标识
pub fn new_thread_id() -> ThreadId {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// Tool 消息的 tool_call_id 没有对应的前序 assistant 调用
    #[error("Tool result '{call_id}' has no matching tool call in thread {thread_id}")]
    OrphanToolResult { thread_id: String, call_id: String },
}

type ThreadLog = Arc<Mutex<Vec<Message>>>;

/// 按线程隔离的对话存储，可在多个并发轮次间共享（Arc<ConversationStore>）
#[derive(Debug, Default)]
pub struct ConversationStore {
    threads: RwLock<HashMap<ThreadId, ThreadLog>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取线程日志；首次写入时隐式创建
    async fn thread_log(&self, thread_id: &str) -> ThreadLog {
        if let Some(log) = self.threads.read().await.get(thread_id) {
            return log.clone();
        }
        let mut threads = self.threads.write().await;
        threads
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(thread_id = %thread_id, "thread created");
                Arc::new(Mutex::new(Vec::new()))
            })
            .clone()
    }

    /// 追加单条消息
    pub async fn append(&self, thread_id: &str, message: Message) -> Result<(), MemoryError> {
        self.append_all(thread_id, vec![message]).await
    }

    /// 在同一把线程锁内按顺序追加一批消息（整批校验通过才写入）
    pub async fn append_all(
        &self,
        thread_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), MemoryError> {
        if messages.is_empty() {
            return Ok(());
        }
        let log = self.thread_log(thread_id).await;
        let mut log = log.lock().await;
        for (i, msg) in messages.iter().enumerate() {
            if msg.role != Role::Tool {
                continue;
            }
            let call_id = msg.tool_call_id.as_deref().unwrap_or_default();
            let declared = log.iter().chain(messages[..i].iter()).any(|m| m.declares_call(call_id));
            if !declared {
                return Err(MemoryError::OrphanToolResult {
                    thread_id: thread_id.to_string(),
                    call_id: call_id.to_string(),
                });
            }
        }
        log.extend(messages);
        Ok(())
    }

    /// 完整历史的快照；未见过的 thread_id 返回空序列
    pub async fn history(&self, thread_id: &str) -> Vec<Message> {
        let log = self.threads.read().await.get(thread_id).cloned();
        match log {
            Some(log) => log.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// 丢弃线程历史；之后同一 id 从空历史重新开始
    pub async fn reset(&self, thread_id: &str) {
        if self.threads.write().await.remove(thread_id).is_some() {
            tracing::info!(thread_id = %thread_id, "thread reset");
        }
    }

    pub async fn len(&self, thread_id: &str) -> usize {
        let log = self.threads.read().await.get(thread_id).cloned();
        match log {
            Some(log) => log.lock().await.len(),
            None => 0,
        }
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn test_unseen_thread_is_empty() {
        let store = ConversationStore::new();
        assert!(store.history("nobody").await.is_empty());
        assert_eq!(store.len("nobody").await, 0);
        // 读取不会创建线程
        assert_eq!(store.thread_count().await, 0);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let store = ConversationStore::new();
        store.append("a", Message::user("hello from a")).await.unwrap();
        store.append("b", Message::user("hello from b")).await.unwrap();
        store.append("a", Message::assistant("reply to a")).await.unwrap();

        let a = store.history("a").await;
        let b = store.history("b").await;
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert!(a.iter().all(|m| !m.content.contains("from b")));
        assert_eq!(b[0].content, "hello from b");
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = ConversationStore::new();
        for i in 0..10 {
            store.append("t", Message::user(format!("m{i}"))).await.unwrap();
        }
        let contents: Vec<String> = store.history("t").await.into_iter().map(|m| m.content).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_reset_discards_history() {
        let store = ConversationStore::new();
        store.append("t", Message::user("one")).await.unwrap();
        store.reset("t").await;
        assert!(store.history("t").await.is_empty());
        store.append("t", Message::user("two")).await.unwrap();
        assert_eq!(store.history("t").await.len(), 1);
    }

    #[tokio::test]
    async fn test_orphan_tool_result_rejected() {
        let store = ConversationStore::new();
        store.append("t", Message::user("q")).await.unwrap();
        let err = store
            .append("t", Message::tool_result("call_x", "data"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::OrphanToolResult { .. }));
        assert_eq!(store.len("t").await, 1);
    }

    #[tokio::test]
    async fn test_tool_result_after_matching_call() {
        let store = ConversationStore::new();
        let call = ToolCall::new("call_1", "get_weather", json!({"location": "Paris"}));
        store
            .append_all(
                "t",
                vec![
                    Message::user("weather?"),
                    Message::assistant_with_tool_calls("", vec![call]),
                    Message::tool_result("call_1", "weather: {}"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.len("t").await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_threads_do_not_interfere() {
        let store = Arc::new(ConversationStore::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("thread-{t}");
                for i in 0..25 {
                    store.append(&id, Message::user(format!("{t}:{i}"))).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        for t in 0..8 {
            let history = store.history(&format!("thread-{t}")).await;
            assert_eq!(history.len(), 25);
            for (i, m) in history.iter().enumerate() {
                assert_eq!(m.content, format!("{t}:{i}"));
            }
        }
    }
}
