//! 错误类型
//!
//! - ToolFailure：工具内部的失败种类，由 ToolExecutor 决定是否重试并最终转成字符串，绝不越过执行器边界。
//! - AgentError：编排层边界上仍可能出现的错误（配置、记忆不变量、取消）。

use thiserror::Error;

use crate::memory::MemoryError;

/// 工具调用失败的种类
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolFailure {
    /// 注册表中没有该名称的工具
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 参数未通过 schema 校验（不重试，说明文本回流给模型自行修正）
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// 缺少凭据等配置问题（不重试）
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// 网络错误、超时、上游返回格式错误（重试一次）
    #[error("Transient failure: {0}")]
    Transient(String),

    /// 上游明确拒绝（如 401 / 404），重试无意义
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ToolFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolFailure::Transient(_))
    }
}

/// 编排层错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// 调用方在两个步骤之间放弃了本轮
    #[error("Cancelled")]
    Cancelled,
}
