//! 记忆层：消息模型与按线程隔离的会话存储（仅进程内）

pub mod conversation;
pub mod store;

pub use conversation::{Message, Role, ToolCall};
pub use store::{new_thread_id, ConversationStore, MemoryError, ThreadId};
