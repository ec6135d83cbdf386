//! Wayfarer - Rust 旅行助手智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排状态机、轮次状态、工具并发调度、构建器、错误类型
//! - **llm**: 决策步骤的 LLM 客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）
//! - **memory**: 消息类型与按线程隔离的对话记忆
//! - **observability**: tracing 日志初始化
//! - **react**: Planner（决策步骤）与轮次过程事件
//! - **tools**: 工具注册表、执行器、统一格式化器与天气 / 预报 / 搜索 / 闲聊工具

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::core::{AgentBuilder, AgentError, Orchestrator};
